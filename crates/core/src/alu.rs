//! Single-cycle ALU execution unit (§4.6).
//!
//! Grounded directly on `original_source/ALU.hpp`'s `ALU` class: a latched
//! `(reorder_index, out)` pair that accepts a new request only while idle
//! (`reorder_index == 0`) and holds its result as a CDB source until the CDB
//! itself carries that tag back, at which point it goes idle again.

use crate::bus::{AluRequest, CdbPacket};
use crate::error::SimError;
use crate::substrate::Reg;

/// One ALU execution unit. A [`crate::rs::StationPool`] of `N` ALU-class
/// stations is paired 1:1 with `N` of these (§2 lists "ALU execution units"
/// as plural) so that multiple independent arithmetic results can be
/// in flight at once, arbitrated only by the global CDB selection.
pub struct Alu {
    tag: Reg<u32>,
    out: Reg<u32>,
}

impl Default for Alu {
    fn default() -> Self {
        Self {
            tag: Reg::default(),
            out: Reg::default(),
        }
    }
}

impl Alu {
    /// A fresh, idle ALU.
    pub fn new() -> Self {
        Self::default()
    }

    /// The CDB broadcast this unit is currently the source for; `tag == 0`
    /// means it has nothing to announce.
    pub fn cdb_out(&self) -> CdbPacket {
        CdbPacket {
            tag: *self.tag.get(),
            data: *self.out.get(),
        }
    }

    fn evaluate(subop: u8, variant: bool, vj: u32, vk: u32) -> Result<u32, SimError> {
        let shift = vk & 0b1_1111;
        let result = match subop {
            0b000 if variant => vj.wrapping_sub(vk),
            0b000 => vj.wrapping_add(vk),
            0b001 => vj.wrapping_shl(shift),
            0b010 => u32::from((vj as i32) < (vk as i32)),
            0b011 => u32::from(vj < vk),
            0b100 => vj ^ vk,
            0b101 if variant => ((vj as i32) >> shift) as u32,
            0b101 => vj >> shift,
            0b110 => vj | vk,
            0b111 => vj & vk,
            _ => return Err(SimError::UnknownAluOp { subop, variant }),
        };
        Ok(result)
    }

    /// Computes next-cycle state. `request` is this cycle's forward from the
    /// paired ALU-class station (`None` if it has nothing ready); `cdb` is
    /// this cycle's arbitrated broadcast; `clear` is the flush decision.
    pub fn pull(&mut self, request: Option<AluRequest>, cdb: CdbPacket, clear: bool) -> Result<(), SimError> {
        let cur_tag = *self.tag.get();
        let cur_out = *self.out.get();

        if clear {
            self.tag.set_next(0);
            self.out.set_next(0);
            return Ok(());
        }

        if cur_tag != 0 {
            let next_tag = if cdb.tag == cur_tag { 0 } else { cur_tag };
            self.tag.set_next(next_tag);
            self.out.set_next(cur_out);
            return Ok(());
        }

        match request {
            Some(r) if r.tag != 0 => {
                let result = Self::evaluate(r.subop, r.variant, r.vj, r.vk)?;
                self.tag.set_next(r.tag);
                self.out.set_next(result);
            }
            _ => {
                self.tag.set_next(0);
                self.out.set_next(cur_out);
            }
        }
        Ok(())
    }

    /// Commits the state staged by [`Alu::pull`].
    pub fn update(&mut self) {
        self.tag.update();
        self.out.update();
    }
}
