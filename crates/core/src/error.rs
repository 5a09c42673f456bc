//! Fatal simulator-detected invariant violations (§7.1).
//!
//! These are the only errors the core ever returns: issuing into a busy
//! reservation station, issuing with a full ROB, an ALU given an unknown
//! subop, a cache access crossing a block boundary, or an out-of-range ROB
//! query. All three kinds are unrecoverable — the spec (§7) treats them as
//! aborting the run with a diagnostic, never as something the pull/update
//! cycle can recover from.

use thiserror::Error;

/// A fatal condition detected by the simulator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Issue was asserted while the target reservation station already held
    /// an in-flight instruction.
    #[error("reservation station {index} is busy but issue was asserted")]
    ReservationStationBusy {
        /// Index of the station within its class's pool.
        index: usize,
    },

    /// Issue was asserted while the ROB had no free slot.
    #[error("ROB full but issue was asserted")]
    RobFull,

    /// The ALU was asked to evaluate a subop it does not recognize.
    #[error("unknown ALU subop {subop:#05b} (variant={variant})")]
    UnknownAluOp {
        /// The unrecognized 3-bit subop.
        subop: u8,
        /// The variant-select bit in effect.
        variant: bool,
    },

    /// A cache access's byte range crossed a block boundary.
    #[error("cache access at {address:#010x} of width {width} crosses a block boundary")]
    CacheBlockCrossing {
        /// The address the access started at.
        address: u32,
        /// The access width in bytes.
        width: u32,
    },

    /// A query named a ROB index outside the valid in-flight range.
    #[error("ROB index {index} is out of range (head={head}, tail={tail})")]
    RobIndexOutOfRange {
        /// The queried index.
        index: u32,
        /// Current ROB head.
        head: usize,
        /// Current ROB tail.
        tail: usize,
    },
}
