//! Binary entry point for the `roxide` command-line tool.
//!
//! Surface: `roxide [FLAGS] e [input] [output]` to compress,
//! `roxide [FLAGS] d [input] [output]` to decompress; missing filenames
//! mean stdin/stdout. Encoding needs two passes over the input, so stdin
//! is spooled to a temporary file first. A summary (sizes, ratio, bits per
//! byte, speed) goes to stderr unless `-q` silences it.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use roxide::display::set_display_level;
use roxide::{decode_stream, encode_stream, CoderConfig, EncodeOptions, Stats, Variant};

const START_INFO: &str = "\
============================================\n\
 roxide: a rolz/lz77/lzp-ari compressor     \n\
============================================\n";

#[derive(Parser)]
#[command(name = "roxide", version, about = "general-purpose byte-stream compressor")]
struct Cli {
    /// Block size in MiB
    #[arg(short = 'b', value_name = "MB", default_value_t = 16)]
    block_mb: u32,

    /// Precompress only (skip the LZ stage)
    #[arg(short = 'p')]
    precompress: bool,

    /// Enable the PE/ELF/BMP content filters
    #[arg(short = 'F')]
    filters: bool,

    /// Quiet mode
    #[arg(short = 'q')]
    quiet: bool,

    /// Pipeline variant (encoding; decoding reads it from the stream)
    #[arg(short = 'V', value_enum, default_value_t = VariantArg::Lz77)]
    variant: VariantArg,

    /// Look-ahead (flexible) parsing instead of lazy parsing
    #[arg(short = 'x')]
    flexible: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compress input to output
    E {
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    },
    /// Decompress input to output
    D {
        input: Option<PathBuf>,
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VariantArg {
    Rolz,
    Lz77,
    Lzp,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Rolz => Variant::Rolz,
            VariantArg::Lz77 => Variant::Lz77,
            VariantArg::Lzp => Variant::Lzp,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.quiet {
        set_display_level(0);
    }
    roxide::displaylevel!(2, "{}\n", START_INFO);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("roxide: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // keep distance arithmetic comfortably inside u32 on-wire fields
    let block_mb = cli.block_mb.clamp(1, 512);
    let opts = EncodeOptions {
        variant: cli.variant.into(),
        block_size: block_mb as usize * 1024 * 1024,
        precompress_only: cli.precompress,
        filters: cli.filters,
        coder: CoderConfig {
            flexible_parsing: cli.flexible,
            ..CoderConfig::default()
        },
    };

    let started = Instant::now();
    match cli.command {
        Command::E { input, output } => {
            let mut src = open_seekable_input(input)?;
            let mut dst = open_output(output)?;
            roxide::displaylevel!(2, "compressing, block_size = {}MB...\n", block_mb);
            let stats = encode_stream(&mut src, &mut dst, &opts)?;
            report(true, stats, started.elapsed().as_secs_f64());
        }
        Command::D { input, output } => {
            let mut src: Box<dyn Read> = match input {
                Some(path) => Box::new(BufReader::new(
                    File::open(&path).with_context(|| format!("opening {}", path.display()))?,
                )),
                None => Box::new(io::stdin().lock()),
            };
            let mut dst = open_output(output)?;
            roxide::displaylevel!(2, "decompressing...\n");
            let stats = decode_stream(&mut src, &mut dst)?;
            report(false, stats, started.elapsed().as_secs_f64());
        }
    }
    Ok(())
}

/// Encoding reads the input twice; stdin gets spooled to a temp file.
fn open_seekable_input(path: Option<PathBuf>) -> anyhow::Result<BufReader<File>> {
    let file = match path {
        Some(path) => File::open(&path).with_context(|| format!("opening {}", path.display()))?,
        None => {
            let mut spool = tempfile::tempfile().context("creating stdin spool file")?;
            io::copy(&mut io::stdin().lock(), &mut spool).context("spooling stdin")?;
            spool.seek(SeekFrom::Start(0))?;
            spool
        }
    };
    Ok(BufReader::new(file))
}

fn open_output(path: Option<PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn report(encode: bool, stats: Stats, seconds: f64) {
    let src = stats.read;
    let dst = stats.written;
    roxide::displaylevel!(2, "{} bytes => {} bytes\n\n", src, dst);
    if seconds <= 0.0 || src == 0 || dst == 0 {
        return;
    }
    let payload = if encode { src } else { dst };
    let ratio = if encode {
        dst as f64 / src as f64
    } else {
        src as f64 / dst as f64
    };
    roxide::displaylevel!(
        2,
        "{}-speed:   {:.3} MB/s\n",
        if encode { "encode" } else { "decode" },
        payload as f64 / 1048576.0 / seconds
    );
    roxide::displaylevel!(2, "cost-time:      {:.3} s\n", seconds);
    roxide::displaylevel!(2, "compress-ratio: {:.3}\n", ratio);
    roxide::displaylevel!(2, "bpb:            {:.3}\n", ratio * 8.0);
}
