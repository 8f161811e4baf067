/// Integration tests: frames written by `FrameWriter` decode back to the
/// original bytes, whatever the write split, variant, or checksum settings.
use lz4block_core::codec::block_checksum;
use lz4block_core::format::{
    DEFAULT_BLOCK_SIZE, FLAG_CONTENT_CHECKSUM, FLAG_STORED_CHECKSUM, HEADER_SIZE,
    MAX_HEADER_SIZE,
};
use lz4block_core::{
    Bytes, CompressionVariant, EncoderConfig, FrameError, FrameHeader, FrameReader, FrameWriter,
    IoSink, Method,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

fn frame_all(config: EncoderConfig, data: &[u8], chunk: usize) -> Vec<Bytes> {
    let mut frames: Vec<Bytes> = Vec::new();
    let mut w = FrameWriter::new(&mut frames, config).unwrap();
    for piece in data.chunks(chunk.max(1)) {
        w.write(piece).unwrap();
    }
    w.close().unwrap();
    frames
}

fn headers(frames: &[Bytes]) -> Vec<FrameHeader> {
    frames
        .iter()
        .map(|f| FrameHeader::parse(f).unwrap())
        .collect()
}

fn decode(frames: &[Bytes]) -> Vec<u8> {
    let stream = frames.concat();
    FrameReader::new(stream.as_slice()).read_all().unwrap()
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_fast() {
    let data = compressible_bytes(4 * DEFAULT_BLOCK_SIZE + 1234);
    let frames = frame_all(EncoderConfig::default(), &data, 10_000);

    // 4 full + 1 partial + terminal
    assert_eq!(frames.len(), 6);
    let hs = headers(&frames);
    assert!(hs[..5].iter().all(|h| h.method == Method::Lz4Fast));
    assert!(hs[5].is_terminal());
    assert_eq!(decode(&frames), data, "fast round-trip should be byte-exact");
}

#[test]
fn test_roundtrip_high() {
    let data = compressible_bytes(3 * DEFAULT_BLOCK_SIZE + 77);
    let config = EncoderConfig::default().with_variant(CompressionVariant::High);
    let frames = frame_all(config, &data, DEFAULT_BLOCK_SIZE);

    let hs = headers(&frames);
    assert!(hs[..3].iter().all(|h| h.method == Method::Lz4High));
    assert_eq!(decode(&frames), data);
}

#[test]
fn test_high_is_no_larger_than_fast() {
    let data = compressible_bytes(2 * DEFAULT_BLOCK_SIZE);
    let fast: usize = frame_all(EncoderConfig::default(), &data, data.len())
        .iter()
        .map(|f| f.len())
        .sum();
    let high_config = EncoderConfig::default().with_variant(CompressionVariant::High);
    let high: usize = frame_all(high_config, &data, data.len())
        .iter()
        .map(|f| f.len())
        .sum();
    assert!(high <= fast, "lz4hc={high} lz4={fast}");
}

#[test]
fn test_incompressible_block_is_stored_raw() {
    let data = pseudo_random_bytes(DEFAULT_BLOCK_SIZE, 0x1234_5678);
    let frames = frame_all(EncoderConfig::default(), &data, data.len());

    assert_eq!(frames.len(), 2);
    let h = FrameHeader::parse(&frames[0]).unwrap();
    assert_eq!(h.method, Method::Raw);
    assert_eq!(h.compressed_len, h.decompressed_len);
    assert_eq!(frames[0].len(), HEADER_SIZE + DEFAULT_BLOCK_SIZE);
    assert_eq!(&frames[0][HEADER_SIZE..], &data[..]);
    assert_eq!(decode(&frames), data);
}

#[test]
fn test_tiny_block_never_expands() {
    // A single byte cannot be compressed below its own length.
    let frames = frame_all(EncoderConfig::default(), b"x", 1);
    let h = FrameHeader::parse(&frames[0]).unwrap();
    assert_eq!(h.method, Method::Raw);
    assert_eq!(h.compressed_len, 1);
    assert_eq!(frames[0].len(), HEADER_SIZE + 1);
}

#[test]
fn test_split_writes_match_single_write() {
    let data = compressible_bytes(3 * DEFAULT_BLOCK_SIZE + 5000);
    let whole = frame_all(EncoderConfig::default(), &data, data.len());
    for chunk in [1usize, 7, 4096, DEFAULT_BLOCK_SIZE - 1, DEFAULT_BLOCK_SIZE + 1] {
        let split = frame_all(EncoderConfig::default(), &data, chunk);
        assert_eq!(split, whole, "chunk size {chunk} changed the frame sequence");
    }
}

#[test]
fn test_header_fields_on_the_wire() {
    let data = compressible_bytes(1000);
    let frames = frame_all(EncoderConfig::default(), &data, data.len());
    let f = &frames[0];

    assert_eq!(&f[..8], b"LZ4Block");
    assert_eq!(f[8], Method::Lz4Fast as u8 | FLAG_CONTENT_CHECKSUM);
    let clen = u32::from_le_bytes(f[9..13].try_into().unwrap());
    let dlen = u32::from_le_bytes(f[13..17].try_into().unwrap());
    let checksum = u32::from_le_bytes(f[17..21].try_into().unwrap());
    assert_eq!(dlen, 1000);
    assert_eq!(clen as usize, f.len() - HEADER_SIZE);
    assert_eq!(checksum, block_checksum(&data));

    let t = &frames[1];
    assert_eq!(t.len(), HEADER_SIZE);
    assert_eq!(&t[..8], b"LZ4Block");
    assert_eq!(t[8], Method::Raw as u8 | FLAG_CONTENT_CHECKSUM);
    assert!(t[9..].iter().all(|&b| b == 0));
}

#[test]
fn test_checksum_disabled() {
    let data = compressible_bytes(500);
    let frames = frame_all(EncoderConfig::default().with_checksum(false), &data, 100);
    let h = FrameHeader::parse(&frames[0]).unwrap();
    assert_eq!(h.flags, 0);
    assert_eq!(h.checksum, 0);
    assert_eq!(decode(&frames), data);
}

#[test]
fn test_stored_checksum_extends_header() {
    let data = compressible_bytes(DEFAULT_BLOCK_SIZE + 10);
    let config = EncoderConfig::default().with_stored_checksum(true);
    let frames = frame_all(config, &data, 4096);

    for h in headers(&frames) {
        assert!(h.has_flag(FLAG_STORED_CHECKSUM));
        assert_eq!(h.encoded_len(), MAX_HEADER_SIZE);
    }
    assert_eq!(frames.last().unwrap().len(), MAX_HEADER_SIZE);
    assert_eq!(decode(&frames), data);
}

#[test]
fn test_corrupted_payload_fails_checksum() {
    let data = pseudo_random_bytes(300, 42);
    let frames = frame_all(EncoderConfig::default(), &data, data.len());
    let mut stream = frames.concat();
    // Raw frame: flip a payload byte.
    stream[HEADER_SIZE + 10] ^= 0xFF;

    let err = FrameReader::new(stream.as_slice()).read_all().unwrap_err();
    assert!(
        matches!(err, FrameError::ChecksumMismatch { kind: "content", .. }),
        "got {err:?}"
    );
}

#[test]
fn test_corrupted_stored_payload_fails_stored_checksum() {
    let data = compressible_bytes(2000);
    let config = EncoderConfig::default().with_stored_checksum(true);
    let frames = frame_all(config, &data, data.len());
    let mut stream = frames.concat();
    stream[MAX_HEADER_SIZE + 3] ^= 0x01;

    let err = FrameReader::new(stream.as_slice()).read_all().unwrap_err();
    assert!(matches!(err, FrameError::ChecksumMismatch { kind: "stored", .. }));
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut stream = frame_all(EncoderConfig::default(), b"abc", 3).concat();
    stream[0] = b'X';
    let err = FrameReader::new(stream.as_slice()).read_all().unwrap_err();
    assert!(matches!(err, FrameError::InvalidMagic));
}

#[test]
fn test_missing_terminal_is_reported() {
    let mut frames = frame_all(EncoderConfig::default(), b"some bytes", 10);
    frames.pop();
    let stream = frames.concat();
    let err = FrameReader::new(stream.as_slice()).read_all().unwrap_err();
    assert!(matches!(err, FrameError::MissingTerminal));
}

#[test]
fn test_truncated_payload_is_an_io_error() {
    let stream = frame_all(EncoderConfig::default(), &compressible_bytes(4000), 4000).concat();
    let cut = &stream[..HEADER_SIZE + 5];
    let err = FrameReader::new(cut).read_all().unwrap_err();
    assert!(matches!(err, FrameError::Io(_)));
}

#[test]
fn test_reader_iterates_frames() {
    let data = compressible_bytes(2 * 1024 + 100);
    let config = EncoderConfig::default().with_block_size(1024);
    let stream = frame_all(config, &data, 333).concat();

    let mut reader = FrameReader::new(stream.as_slice());
    let lens: Vec<usize> = reader
        .by_ref()
        .map(|f| f.unwrap().data.len())
        .collect();
    assert_eq!(lens, vec![1024, 1024, 100]);
    assert!(reader.is_finished());
    assert_eq!(reader.frames_read(), 3);
}

#[test]
fn test_io_sink_and_io_write() {
    use std::io::Write;

    let data = compressible_bytes(5 * 1024 + 17);
    let config = EncoderConfig::default().with_block_size(1024);
    let mut w = FrameWriter::new(IoSink::new(Vec::new()), config).unwrap();
    std::io::copy(&mut data.as_slice(), &mut w).unwrap();
    Write::flush(&mut w).unwrap();
    assert_eq!(w.current_block_length(), 0);
    w.close().unwrap();

    let stream = w.into_sink().into_inner();
    let decoded = FrameReader::new(stream.as_slice()).read_all().unwrap();
    assert_eq!(decoded, data);
}
