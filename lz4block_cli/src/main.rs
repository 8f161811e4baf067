use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, Level};

use lz4block_core::{
    CompressionVariant, EncoderConfig, FrameHeader, FrameReader, FrameWriter, IoSink, Placement,
};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "lz4block",
    about = "Frame, unframe, and inspect LZ4Block streams",
    version
)]
struct Cli {
    /// Log verbosity: -v for debug, -vv for per-frame trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a stream of LZ4Block frames
    Compress {
        /// Source file ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
        /// Raw bytes per block (default: 65536 = 64 KB)
        #[arg(short, long)]
        block_size: Option<usize>,
        /// Use the high-compression LZ4 variant
        #[arg(long)]
        high: bool,
        /// Omit the XXH32 checksum of each block
        #[arg(long)]
        no_checksum: bool,
        /// Also checksum each payload as written
        #[arg(long)]
        stored_checksum: bool,
        /// Size scratch buffers exactly instead of page-rounding them
        #[arg(long)]
        heap: bool,
        /// JSON encoder config; flags given on the command line override it
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Decode a frame stream back to raw bytes
    Decompress {
        /// Source frame stream ("-" reads stdin)
        input: PathBuf,
        /// Destination file ("-" writes to stdout)
        output: PathBuf,
    },
    /// Print stream statistics and frame headers
    Inspect {
        /// Frame stream to inspect
        file: PathBuf,
        /// Print one line per frame
        #[arg(long)]
        frames: bool,
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_str() == Some("-")
}

fn open_input(path: &Path) -> anyhow::Result<Box<dyn Read>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("opening input file {:?}", path))?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> anyhow::Result<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(BufWriter::new(io::stdout())));
    }
    let file = File::create(path).with_context(|| format!("creating output file {:?}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EncoderConfig> {
    match path {
        None => Ok(EncoderConfig::default()),
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {:?}", path))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {:?}", path))
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn throughput(bytes: u64, secs: f64) -> String {
    if secs > 0.0 {
        format!("{}/s", human_bytes((bytes as f64 / secs) as u64))
    } else {
        "n/a".to_string()
    }
}

// ── Subcommand implementations ─────────────────────────────────────────────

struct CompressArgs {
    block_size: Option<usize>,
    high: bool,
    no_checksum: bool,
    stored_checksum: bool,
    heap: bool,
    config: Option<PathBuf>,
}

impl CompressArgs {
    fn resolve(&self) -> anyhow::Result<EncoderConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if self.high {
            config.variant = CompressionVariant::High;
        }
        if self.no_checksum {
            config.checksum = false;
        }
        if self.stored_checksum {
            config.stored_checksum = true;
        }
        if self.heap {
            config.placement = Placement::Heap;
        }
        Ok(config)
    }
}

fn run_compress(input: PathBuf, output: PathBuf, args: CompressArgs) -> anyhow::Result<()> {
    let config = args.resolve()?;
    debug!("encoder config: {:?}", config);

    let mut src = open_input(&input)?;
    let dst = open_output(&output)?;
    let mut writer = FrameWriter::new(IoSink::new(dst), config.clone())
        .context("invalid encoder configuration")?;

    let t0 = Instant::now();
    io::copy(&mut src, &mut writer).with_context(|| format!("compressing {:?}", input))?;
    writer.close()?;
    let elapsed = t0.elapsed().as_secs_f64();

    let stats = writer.stats();
    writer.into_sink().into_inner().flush()?;

    let ratio = if stats.bytes_out > 0 {
        stats.bytes_written as f64 / stats.bytes_out as f64
    } else {
        0.0
    };
    info!(
        "compressed {} into {} frames",
        human_bytes(stats.bytes_written),
        stats.frames
    );
    eprintln!(
        "  variant     : {}",
        match config.variant {
            CompressionVariant::Fast => "lz4",
            CompressionVariant::High => "lz4hc",
        }
    );
    eprintln!("  block size  : {}", human_bytes(config.block_size as u64));
    eprintln!(
        "  frames      : {} ({} compressed)",
        stats.frames, stats.compressed_frames
    );
    eprintln!("  raw size    : {}", human_bytes(stats.bytes_written));
    eprintln!("  framed size : {}", human_bytes(stats.bytes_out));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!("  throughput  : {}", throughput(stats.bytes_written, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let mut reader = FrameReader::new(open_input(&input)?);
    let mut dst = open_output(&output)?;

    let t0 = Instant::now();
    let mut total_raw = 0u64;
    while let Some(frame) = reader
        .next_frame()
        .with_context(|| format!("decoding frame {} of {:?}", reader.frames_read(), input))?
    {
        total_raw += frame.data.len() as u64;
        dst.write_all(&frame.data)?;
    }
    dst.flush()?;
    let elapsed = t0.elapsed().as_secs_f64();

    eprintln!("  frames      : {}", reader.frames_read());
    eprintln!("  raw size    : {}", human_bytes(total_raw));
    eprintln!("  throughput  : {}", throughput(total_raw, elapsed));
    eprintln!("  elapsed     : {:.3}s", elapsed);
    Ok(())
}

#[derive(Serialize)]
struct FrameRecord {
    index: u64,
    offset: u64,
    method: &'static str,
    header: FrameHeader,
}

#[derive(Serialize)]
struct InspectReport {
    frames: u64,
    compressed_frames: u64,
    raw_size: u64,
    stream_size: u64,
    ratio: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<FrameRecord>,
}

fn run_inspect(file: PathBuf, show_frames: bool, json: bool) -> anyhow::Result<()> {
    let stream_size = std::fs::metadata(&file)
        .with_context(|| format!("reading metadata of {:?}", file))?
        .len();
    let mut reader = FrameReader::new(open_input(&file)?);

    let mut report = InspectReport {
        frames: 0,
        compressed_frames: 0,
        raw_size: 0,
        stream_size,
        ratio: 0.0,
        headers: Vec::new(),
    };
    let mut offset = 0u64;
    while let Some(frame) = reader
        .next_frame()
        .with_context(|| format!("decoding frame {} at offset {}", report.frames, offset))?
    {
        let header = frame.header;
        if show_frames {
            report.headers.push(FrameRecord {
                index: report.frames,
                offset,
                method: header.method.name(),
                header,
            });
        }
        report.frames += 1;
        if header.method.is_compressed() {
            report.compressed_frames += 1;
        }
        report.raw_size += header.decompressed_len as u64;
        offset += (header.encoded_len() + header.compressed_len as usize) as u64;
    }
    if stream_size > 0 {
        report.ratio = report.raw_size as f64 / stream_size as f64;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("=== LZ4Block stream: {:?} ===", file);
    println!();
    println!(
        "  frames         : {} ({} compressed)",
        report.frames, report.compressed_frames
    );
    println!("  raw size       : {}", human_bytes(report.raw_size));
    println!("  stream on disk : {}", human_bytes(report.stream_size));
    println!("  ratio          : {:.2}x", report.ratio);

    if show_frames {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>6}  {:>12}  {:>12}  {:>10}",
            "frame", "offset", "method", "compressed", "raw", "checksum"
        );
        println!("  {}", "-".repeat(70));
        for r in &report.headers {
            println!(
                "  {:>8}  {:>14}  {:>6}  {:>12}  {:>12}  {:08x}",
                r.index,
                r.offset,
                r.method,
                human_bytes(r.header.compressed_len as u64),
                human_bytes(r.header.decompressed_len as u64),
                r.header.checksum
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Compress {
            input,
            output,
            block_size,
            high,
            no_checksum,
            stored_checksum,
            heap,
            config,
        } => run_compress(
            input,
            output,
            CompressArgs {
                block_size,
                high,
                no_checksum,
                stored_checksum,
                heap,
                config,
            },
        ),
        Commands::Decompress { input, output } => run_decompress(input, output),
        Commands::Inspect { file, frames, json } => run_inspect(file, frames, json),
    }
}
