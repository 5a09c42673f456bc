//! Cycle-accurate Tomasulo-style RV32I superscalar core simulator.
//!
//! This crate is the simulator proper: given a [`MemoryImage`] and a
//! [`Config`], [`Cpu::run`] executes to the fixed halt instruction and
//! returns the low 8 bits of architectural register 10. Parsing the hex-dump
//! memory format, the command-line surface, and telemetry formatting live in
//! the companion `tomasulo-sim` binary crate, not here.

mod alu;
mod bus;
mod config;
mod cpu;
mod error;
mod image;
mod isa;
mod memory;
mod predictor;
mod regfile;
mod rob;
mod rs;
mod stats;
mod substrate;

pub use config::{Config, MemoryConfig};
pub use cpu::Cpu;
pub use error::SimError;
pub use image::MemoryImage;
pub use isa::HALT_INSTRUCTION;
pub use memory::CacheParams;
pub use predictor::PredictorKind;
pub use stats::Stats;
