//! Byte-addressable memory initializer (§1 "Out of scope").
//!
//! Parsing the textual hex-dump format is the CLI's job; the core only
//! consumes the resulting sparse byte map. Kept as its own small type
//! (rather than a bare `HashMap`) so the core's public surface names the
//! contract explicitly, the way the teacher's `hardware` crate takes a
//! pre-built `Config`/ELF image rather than reading files itself.

use std::collections::HashMap;

/// A sparse byte-addressed initial memory image. Unset addresses read as 0.
#[derive(Clone, Debug, Default)]
pub struct MemoryImage {
    bytes: HashMap<u32, u8>,
}

impl MemoryImage {
    /// An empty image (every byte reads as 0).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the byte at `address`.
    pub fn set_byte(&mut self, address: u32, value: u8) {
        self.bytes.insert(address, value);
    }

    /// The byte at `address`, or 0 if never set.
    pub fn byte(&self, address: u32) -> u8 {
        *self.bytes.get(&address).unwrap_or(&0)
    }

    pub(crate) fn bytes(&self) -> &HashMap<u32, u8> {
        &self.bytes
    }
}
