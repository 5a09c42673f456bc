//! Bus packet types carried between components each cycle.
//!
//! Mirrors `examples/original_source/bus.hpp`'s `RSBus`/`ALUBus`/`MemBus`/
//! `CommonDataBus` structs, translated into plain Rust value types. A tag of
//! `0` universally means "nothing": no broadcast, no producer, no pending
//! instruction.

/// A single broadcast on the common data bus: the producing ROB tag and the
/// value it produced. Tag `0` means "no broadcast this cycle."
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CdbPacket {
    /// ROB tag of the producing instruction, or 0 for "no broadcast."
    pub tag: u32,
    /// The broadcast value.
    pub data: u32,
}

impl CdbPacket {
    /// The canonical "nothing broadcast" packet.
    pub const NONE: CdbPacket = CdbPacket { tag: 0, data: 0 };
}

/// The packet issue installs into a reservation station: operands may be
/// ready values or producer tags awaiting a CDB match.
#[derive(Clone, Copy, Debug, Default)]
pub struct RsEntry {
    /// ROB tag of the instruction occupying this station; 0 = free.
    pub tag: u32,
    /// Producer tag for the first operand; 0 = `vj` is already valid.
    pub qj: u32,
    /// Producer tag for the second operand; 0 = `vk` is already valid.
    pub qk: u32,
    /// First operand value (the base register for Mem-class, left operand
    /// for ALU-class — including a store's address-base register, since
    /// stores compute their address through the ALU, not the memory unit).
    pub vj: u32,
    /// Second operand value (right operand for ALU-class, unused for
    /// Mem-class since a load has no second operand).
    pub vk: u32,
    /// funct3 / subop, remapped per §4.9 for branches. For Mem-class
    /// stations this is the load width encoding (§4.7).
    pub subop: u8,
    /// §4.2 variant-select bit (ALU-class only; unused for Mem-class).
    pub variant: bool,
    /// Immediate (used as the address offset by Mem-class stations).
    pub imm: i32,
}

impl RsEntry {
    /// A station is ready to execute once both operands have resolved.
    pub fn is_ready(&self) -> bool {
        self.tag != 0 && self.qj == 0 && self.qk == 0
    }

    /// A free (unoccupied) station.
    pub fn is_free(&self) -> bool {
        self.tag == 0
    }
}

/// What an ALU-class reservation station forwards to its execution unit once
/// ready.
#[derive(Clone, Copy, Debug, Default)]
pub struct AluRequest {
    /// ROB tag this result belongs to; 0 = no request.
    pub tag: u32,
    /// funct3 / subop.
    pub subop: u8,
    /// Variant-select bit.
    pub variant: bool,
    /// Left operand.
    pub vj: u32,
    /// Right operand.
    pub vk: u32,
}

/// What a Mem-class reservation station forwards to the memory unit once
/// ready and the ROB's load-ordering check has passed. Mem-class stations
/// only ever hold loads — stores resolve their address through an
/// ALU-class station instead (§4.9) and write memory directly at commit.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemRequest {
    /// ROB tag this result belongs to; 0 = no request.
    pub tag: u32,
    /// Width/sign-extension mode (§4.7's load subop encoding).
    pub subop: u8,
    /// Effective address (`vj + imm`).
    pub address: u32,
}

/// A store retiring at commit: written directly to memory, never
/// speculative, never carrying a tag.
#[derive(Clone, Copy, Debug)]
pub struct StoreCommit {
    /// Store width/mode (mirrors the load subop encoding: 0=byte, 1=half,
    /// 2=word).
    pub width: u8,
    /// Store address.
    pub address: u32,
    /// Data to write (only the low `width` bytes are used).
    pub data: u32,
}
