//! Command-line entry point for the Tomasulo RV32I simulator.
//!
//! Reads a hex-dump memory image, builds a [`Cpu`] from construction-time
//! configuration flags, runs it to completion, and prints the exit value
//! (§6 "Exit channel"). Everything the core itself treats as out of scope —
//! the hex-dump parser, argument handling, and telemetry printing — lives
//! here.

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tomasulo_core::{Config, Cpu, MemoryConfig, MemoryImage, PredictorKind};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PredictorArg {
    AlwaysTaken,
    NeverTaken,
    Bimodal,
    Correlating,
    Tournament,
}

#[derive(Parser, Debug)]
#[command(
    name = "tomasulo-sim",
    author,
    version,
    about = "Cycle-accurate Tomasulo-style RV32I superscalar simulator",
    long_about = "Runs a memory image to completion on the out-of-order core and prints the \
                  low 8 bits of register x10 as the process exit code.\n\n\
                  The memory image is a whitespace-separated hex dump: `@HHHHHHHH` sets the \
                  current address, `HH` writes a byte there and advances by one. Read from a \
                  file with --image, or from stdin if omitted."
)]
struct Cli {
    /// Path to a hex-dump memory image; reads stdin if omitted.
    #[arg(short, long)]
    image: Option<String>,

    /// Reorder buffer capacity.
    #[arg(long, default_value_t = Config::default().rob_len)]
    rob_len: usize,

    /// ALU-class reservation station count.
    #[arg(long, default_value_t = Config::default().n_alu_rs)]
    n_alu_rs: usize,

    /// Memory-class reservation station count.
    #[arg(long, default_value_t = Config::default().n_mem_rs)]
    n_mem_rs: usize,

    /// Branch predictor variant.
    #[arg(long, value_enum, default_value = "bimodal")]
    predictor: PredictorArg,

    /// Predictor PC-index bits (Bimodal/Correlating/Tournament).
    #[arg(long, default_value_t = 10)]
    predictor_index_bits: u32,

    /// Predictor global-history bits (Correlating/Tournament).
    #[arg(long, default_value_t = 4)]
    predictor_history_bits: u32,

    /// Predictor chooser-table bits (Tournament only).
    #[arg(long, default_value_t = 6)]
    predictor_chooser_bits: u32,

    /// Enable the set-associative cache instead of plain fixed-latency memory.
    #[arg(long)]
    cache: bool,

    /// Plain-memory load/store latency, in cycles (ignored with --cache).
    #[arg(long, default_value_t = 3)]
    memory_delay: u32,

    /// Cache set-index bits (`2^s` sets).
    #[arg(long, default_value_t = 4)]
    cache_set_bits: u32,

    /// Cache ways per set.
    #[arg(long, default_value_t = 4)]
    cache_ways: usize,

    /// Cache block-offset bits (`2^b`-byte blocks).
    #[arg(long, default_value_t = 4)]
    cache_block_bits: u32,

    /// Cache hit latency, in cycles.
    #[arg(long, default_value_t = 0)]
    cache_hit_delay: u32,

    /// Cache miss latency, in cycles.
    #[arg(long, default_value_t = 2)]
    cache_miss_delay: u32,

    /// Print cycle count, branch-prediction accuracy, and cache hit rate
    /// after the run (§6 "profile knob").
    #[arg(long)]
    profile: bool,
}

fn predictor_kind(cli: &Cli) -> PredictorKind {
    match cli.predictor {
        PredictorArg::AlwaysTaken => PredictorKind::AlwaysTaken,
        PredictorArg::NeverTaken => PredictorKind::NeverTaken,
        PredictorArg::Bimodal => PredictorKind::Bimodal {
            index_bits: cli.predictor_index_bits,
        },
        PredictorArg::Correlating => PredictorKind::Correlating {
            index_bits: cli.predictor_index_bits,
            history_bits: cli.predictor_history_bits,
        },
        PredictorArg::Tournament => PredictorKind::Tournament {
            index_bits: cli.predictor_index_bits,
            history_bits: cli.predictor_history_bits,
            chooser_bits: cli.predictor_chooser_bits,
        },
    }
}

fn memory_config(cli: &Cli) -> MemoryConfig {
    if cli.cache {
        MemoryConfig::Cache {
            set_bits: cli.cache_set_bits,
            ways: cli.cache_ways,
            block_bits: cli.cache_block_bits,
            hit_delay: cli.cache_hit_delay,
            miss_delay: cli.cache_miss_delay,
        }
    } else {
        MemoryConfig::Plain {
            delay: cli.memory_delay,
        }
    }
}

/// Parses the `@HHHHHHHH` / `HH` hex-dump token stream (§6 "Memory image").
fn parse_image(text: &str) -> Result<MemoryImage, String> {
    let mut image = MemoryImage::new();
    let mut addr: u32 = 0;
    for token in text.split_ascii_whitespace() {
        if let Some(hex) = token.strip_prefix('@') {
            addr = u32::from_str_radix(hex, 16).map_err(|e| format!("bad address token {token:?}: {e}"))?;
        } else {
            let byte = u8::from_str_radix(token, 16).map_err(|e| format!("bad byte token {token:?}: {e}"))?;
            image.set_byte(addr, byte);
            addr = addr.wrapping_add(1);
        }
    }
    Ok(image)
}

fn read_image_text(path: Option<&str>) -> Result<String, String> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|e| format!("reading {path}: {e}")),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| format!("reading stdin: {e}"))?;
            Ok(buf)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config {
        rob_len: cli.rob_len,
        n_alu_rs: cli.n_alu_rs,
        n_mem_rs: cli.n_mem_rs,
        predictor: predictor_kind(&cli),
        memory: memory_config(&cli),
        profile: cli.profile,
    };

    if let Err(msg) = config.validate() {
        eprintln!("invalid configuration: {msg}");
        return ExitCode::FAILURE;
    }

    let text = match read_image_text(cli.image.as_deref()) {
        Ok(text) => text,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match parse_image(&text) {
        Ok(image) => image,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    info!(rob_len = config.rob_len, n_alu_rs = config.n_alu_rs, n_mem_rs = config.n_mem_rs, "starting run");

    let mut cpu = Cpu::new(&config, &image);
    let exit = match cpu.run() {
        Ok(exit) => exit,
        Err(err) => {
            eprintln!("fatal: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("{exit}");
    if config.profile {
        cpu.stats().print();
    }

    ExitCode::from(exit)
}
