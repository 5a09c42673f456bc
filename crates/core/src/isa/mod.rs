//! RV32I instruction set: field extraction and the pure decoder.

/// Raw field extraction and opcode constants.
pub mod fields;

/// The decoder proper: maps a 32-bit word to a [`decode::Decoded`] projection.
pub mod decode;

pub use decode::{decode, Decoded};
pub use fields::{format_of, Format, InstructionBits};

/// The fixed halt instruction word. When the ROB would commit this exact
/// word, the simulation halts and yields `regs[10] & 0xFF` (§6).
pub const HALT_INSTRUCTION: u32 = 0x0ff0_0513;
