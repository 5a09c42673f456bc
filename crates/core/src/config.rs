//! Construction-time configuration (§6: "No environment variables").
//!
//! Every knob here is fixed when the [`crate::cpu::Cpu`] is built and never
//! changes during a run: ROB length, reservation-station counts, the
//! memory/cache backend, and the branch-predictor variant. Mirrors the
//! teacher's hierarchical `Config`/`*Config` structuring, minus `serde` —
//! this simulator has no JSON/file config surface (that was the teacher's
//! Python-scripting path, which this spec does not carry forward).

use crate::predictor::PredictorKind;

/// Default baseline hardware constants, mirroring the teacher's `defaults`
/// module.
mod defaults {
    /// Reorder buffer capacity.
    pub const ROB_LEN: usize = 32;
    /// ALU-class reservation station pool size.
    pub const N_ALU_RS: usize = 4;
    /// Memory-class reservation station pool size.
    pub const N_MEM_RS: usize = 4;
    /// Plain-memory load/store latency, in cycles.
    pub const MEMORY_DELAY: u32 = 3;
}

/// Main memory backend selection.
#[derive(Debug, Clone, Copy)]
pub enum MemoryConfig {
    /// Flat, fixed-latency byte-addressed memory (§4.7 "Plain memory").
    Plain {
        /// Cycles between a load/store request and its CDB publication.
        delay: u32,
    },
    /// Set-associative write-through cache in front of plain memory
    /// (§4.7 "Set-associative cache").
    Cache {
        /// Number of set-index bits (`s`): `2^s` sets.
        set_bits: u32,
        /// Ways per set (`E`).
        ways: usize,
        /// Number of block-offset bits (`b`): `2^b`-byte blocks.
        block_bits: u32,
        /// Latency on a hit.
        hit_delay: u32,
        /// Latency on a miss (paid in addition to filling from backing
        /// memory, which itself takes `miss_delay`).
        miss_delay: u32,
    },
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig::Plain {
            delay: defaults::MEMORY_DELAY,
        }
    }
}

/// Root simulator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Reorder buffer capacity (`L`, must be ≥ 2).
    pub rob_len: usize,
    /// Number of ALU-class reservation stations.
    pub n_alu_rs: usize,
    /// Number of memory-class reservation stations.
    pub n_mem_rs: usize,
    /// Branch predictor variant and its parameters.
    pub predictor: PredictorKind,
    /// Memory backend: plain fixed-latency or set-associative cache.
    pub memory: MemoryConfig,
    /// When true, `Cpu::run` collects and the CLI reports cycle count,
    /// branch-prediction accuracy, and cache hit rate (§6 "profile knob").
    pub profile: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rob_len: defaults::ROB_LEN,
            n_alu_rs: defaults::N_ALU_RS,
            n_mem_rs: defaults::N_MEM_RS,
            predictor: PredictorKind::default(),
            memory: MemoryConfig::default(),
            profile: false,
        }
    }
}

impl Config {
    /// Validates construction-time invariants (§5 "Resource limits"): ROB
    /// length must be at least 2. RS/cache sizing has no lower bound beyond
    /// what the types already enforce (≥ 1 by construction).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.rob_len < 2 {
            return Err("ROB length must be at least 2");
        }
        if self.n_alu_rs == 0 || self.n_mem_rs == 0 {
            return Err("reservation station pools must be non-empty");
        }
        Ok(())
    }
}
