use anyhow::{bail, ensure};
use clap::{Args, Parser, Subcommand};
use deflate_gzip::codec::Encoder;
use deflate_gzip::{BufferedDecoder, BufferedEncoder, DecodeOutcome, DEFAULT_LEVEL, MIN_CAPACITY};
use human_bytes::human_bytes;
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Error;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_MAX_SIZE: usize = 1 << 30;

#[derive(Parser)]
struct Config {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file into <file>.gz
    Compress(CompressionCfg),
    /// Decompress a gzip file
    Decompress(DecompressionCfg),
    /// Benchmark compression+decompression of a single file
    Benchmark(CompressionCfg),
    /// Run benchmarks for multiple compression levels
    BenchmarkMany(BenchmarkManyCfg),
}

#[derive(Args, Clone)]
struct BufferCfg {
    /// Initial size of the output buffer in bytes
    #[arg(long, default_value_t = MIN_CAPACITY)]
    initial_size: usize,

    /// Maximum size of the output buffer in bytes
    #[arg(long)]
    max_size: Option<usize>,
}

#[derive(Args)]
struct CompressionCfg {
    /// Input file path
    #[arg()]
    path: PathBuf,

    /// Compression level (0-12)
    #[arg(long, short = 'c', default_value_t = DEFAULT_LEVEL, allow_hyphen_values = true)]
    compression: i32,

    #[clap(flatten)]
    buffer: BufferCfg,
}

#[derive(Args)]
struct DecompressionCfg {
    /// Input file path
    #[arg()]
    path: PathBuf,

    #[clap(flatten)]
    buffer: BufferCfg,
}

#[derive(Args)]
struct BenchmarkManyCfg {
    /// Input file path
    #[arg()]
    path: PathBuf,

    /// List of compression levels to benchmark
    #[arg(long, short = 'c', value_delimiter = ',', default_value = "1,3,6,9,12", num_args = 1.., allow_hyphen_values = true)]
    levels: Vec<i32>,

    #[clap(flatten)]
    buffer: BufferCfg,

    /// Save benchmark results to a CSV file
    #[arg(long, short)]
    report: Option<PathBuf>,
}

struct Measurement {
    input_len: u64,
    output_len: u64,
    elapsed: Duration,
}

impl Measurement {
    fn compression_ratio(&self) -> f64 {
        self.output_len as f64 / self.input_len as f64
    }

    fn input_throughtput(&self) -> f64 {
        self.input_len as f64 / self.elapsed.as_secs_f64()
    }

    fn output_throughtput(&self) -> f64 {
        self.output_len as f64 / self.elapsed.as_secs_f64()
    }

    fn format_compression(&self) -> String {
        format!(
            "{} => {} ({:.1} %)",
            self.input_len,
            self.output_len,
            self.compression_ratio() * 100.0
        )
    }
}

#[derive(Serialize)]
struct BenchmarkResult {
    level: i32,
    uncompressed_len: u64,
    compressed_len: u64,
    ratio: f64,
    inv_ratio: f64,
    compression_speed_mpbs: f64,
    decompression_speed_mpbs: f64,
}

impl BenchmarkResult {
    fn new(level: i32, compression: Measurement, decompression: Measurement) -> Self {
        Self {
            level,
            uncompressed_len: compression.input_len,
            compressed_len: compression.output_len,
            ratio: (compression.compression_ratio() * 1000.0).round() / 1000.0,
            inv_ratio: (1.0 / compression.compression_ratio() * 1000.0).round() / 1000.0,
            compression_speed_mpbs: (compression.input_throughtput() / 100_000.0).round() / 10.0,
            decompression_speed_mpbs: (decompression.output_throughtput() / 100_000.0).round() / 10.0,
        }
    }
}

impl Display for BenchmarkResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gzip lev. {:3}:    {:8} => {:8} ({:5.1}%, {:4.2}x),    compr.: {:6.1} MB/s, decompr.: {:6.1} MB/s",
            self.level,
            human_bytes(self.uncompressed_len as f64),
            human_bytes(self.compressed_len as f64),
            self.ratio * 100.0,
            1.0 / self.ratio,
            self.compression_speed_mpbs,
            self.decompression_speed_mpbs
        )
    }
}

fn main() {
    setup_logging();
    let cmd = Config::parse();
    if let Err(e) = run(cmd) {
        eprintln!("error: {}", e);
        exit(1);
    }
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,deflate_gzip=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

fn run(cmd: Config) -> anyhow::Result<()> {
    match cmd.command {
        Command::Decompress(cfg) => run_decompress_cmd(cfg),
        Command::Compress(cfg) => run_compress_cmd(cfg),
        Command::Benchmark(cfg) => run_benchmark_cmd(&cfg).map(|_| ()),
        Command::BenchmarkMany(cfg) => run_benchmark_many_cmd(cfg),
    }
}

fn run_compress_cmd(cfg: CompressionCfg) -> anyhow::Result<()> {
    let input = read_input(&cfg.path)?;
    let mut encoder = encoder(&cfg, input.len())?;
    let result = measure(input.len(), || compress(&mut encoder, &input))?;
    write_output(&output_path(&cfg.path, true), encoder.output())?;
    info!(
        "{}, {:.1} MB/s",
        result.format_compression(),
        result.input_throughtput() / 1_000_000.0
    );
    Ok(())
}

fn run_decompress_cmd(cfg: DecompressionCfg) -> anyhow::Result<()> {
    let input = read_input(&cfg.path)?;
    let mut decoder = decoder(&cfg.buffer)?;
    let result = measure(input.len(), || decompress(&mut decoder, &input))?;
    write_output(&output_path(&cfg.path, false), decoder.output())?;
    info!(
        "{}, {:.1} MB/s",
        result.format_compression(),
        result.output_throughtput() / 1_000_000.0
    );
    Ok(())
}

fn run_benchmark_cmd(cfg: &CompressionCfg) -> anyhow::Result<BenchmarkResult> {
    let input = read_input(&cfg.path)?;
    let mut encoder = encoder(cfg, input.len())?;
    let mut decoder = decoder(&cfg.buffer)?;

    let c_perf = measure(input.len(), || compress(&mut encoder, &input))?;
    let compressed = encoder.output();
    let d_perf = measure(compressed.len(), || decompress(&mut decoder, compressed))?;
    ensure!(
        decoder.output() == input.as_slice(),
        "round-trip mismatch at level {}",
        cfg.compression
    );

    let result = BenchmarkResult::new(cfg.compression, c_perf, d_perf);
    println!("{}", result);
    Ok(result)
}

fn run_benchmark_many_cmd(cfg: BenchmarkManyCfg) -> anyhow::Result<()> {
    let mut results = Vec::new();

    for level in cfg.levels {
        let run_cfg = CompressionCfg {
            path: cfg.path.clone(),
            compression: level,
            buffer: cfg.buffer.clone(),
        };
        results.push(run_benchmark_cmd(&run_cfg)?);
    }

    if let Some(path) = cfg.report {
        let mut writer = csv::Writer::from_path(path)?;
        for result in results {
            writer.serialize(&result)?;
        }
        writer.flush()?;
    }

    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|e| {
        Error::new(
            e.kind(),
            format!("Could not read file {}: {}", path.display(), e),
        )
    })
}

fn write_output(path: &Path, data: &[u8]) -> Result<(), Error> {
    fs::write(path, data).map_err(|e| {
        Error::new(
            e.kind(),
            format!("Could not write file {}: {}", path.display(), e),
        )
    })
}

/// `a.txt` -> `a.txt.gz` when compressing; `a.txt.gz` -> `a.txt` when
/// decompressing, or `a.bin` -> `a.bin.out` if there is no `.gz` suffix.
fn output_path(input_path: &Path, compress: bool) -> PathBuf {
    let mut name = input_path.as_os_str().to_owned();
    if compress {
        name.push(".gz");
        return PathBuf::from(name);
    }
    match input_path.extension() {
        Some(ext) if ext == "gz" => input_path.with_extension(""),
        _ => {
            name.push(".out");
            PathBuf::from(name)
        }
    }
}

fn encoder(cfg: &CompressionCfg, input_len: usize) -> anyhow::Result<BufferedEncoder> {
    let max_size = match cfg.buffer.max_size {
        Some(max_size) => max_size,
        None => {
            // probe the worst case with a throwaway session at the same level
            let mut probe = deflate_gzip::GzipCompressor::new(cfg.compression)?;
            probe.compressed_len_bound(input_len).max(MIN_CAPACITY)
        }
    };
    let initial_size = cfg.buffer.initial_size.min(max_size);
    Ok(BufferedEncoder::new(cfg.compression, initial_size, max_size)?)
}

fn decoder(cfg: &BufferCfg) -> anyhow::Result<BufferedDecoder> {
    let max_size = cfg.max_size.unwrap_or(DEFAULT_MAX_SIZE);
    Ok(BufferedDecoder::new(cfg.initial_size, max_size)?)
}

fn compress(encoder: &mut BufferedEncoder, input: &[u8]) -> anyhow::Result<usize> {
    if !encoder.compress(input)? {
        bail!(
            "Compressed data does not fit in {} bytes. Please raise --max-size.",
            encoder.max_capacity()
        );
    }
    Ok(encoder.output().len())
}

fn decompress(decoder: &mut BufferedDecoder, input: &[u8]) -> anyhow::Result<usize> {
    match decoder.decompress(input)? {
        DecodeOutcome::Success { consumed } => {
            if consumed < input.len() {
                info!(
                    "ignoring {} trailing bytes after the gzip member",
                    input.len() - consumed
                );
            }
            Ok(decoder.output().len())
        }
        DecodeOutcome::BadData => bail!("Input is not valid gzip data"),
        DecodeOutcome::InsufficientSpace => bail!(
            "Decompressed data does not fit in {} bytes. Please raise --max-size.",
            decoder.max_capacity()
        ),
    }
}

/// Measure performance of compression or decompression
fn measure(
    input_len: usize,
    mut process: impl FnMut() -> anyhow::Result<usize>,
) -> anyhow::Result<Measurement> {
    let start_time = Instant::now();
    let output_len = process()?;
    let end_time = Instant::now();

    Ok(Measurement {
        input_len: input_len as u64,
        output_len: output_len as u64,
        elapsed: end_time - start_time,
    })
}
