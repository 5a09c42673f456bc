//! Reorder buffer: in-order commit, speculation rollback (§4.4).
//!
//! A one-based circular buffer of configurable length `L ≥ 2`; index `0` is
//! never a valid entry and means "no instruction" wherever it appears as a
//! tag. Grounded on `original_source/ROB.hpp`'s `ReorderBuffer` (the
//! 1-based indexing, `head`/`tail` advance rules, and the commit/flush
//! query shape), re-expressed over [`crate::substrate::Reg`] cells with the
//! per-entry transition functions inlined into [`Rob::pull`] rather than
//! stored per-field closures, matching this crate's substrate translation
//! (see `substrate.rs`).
//!
//! One deviation from the retrieved original: its `is_mispredicted` returns
//! `branched == should_branch` (misprediction exactly when the prediction
//! *matches* the outcome), which contradicts the plain-language contract in
//! this simulator's own commit table ("on mismatch, flush"). That table is
//! authoritative here; `Rob::is_mispredicted` flags a misprediction when
//! `branched != should_branch`.

use crate::bus::{CdbPacket, StoreCommit};
use crate::error::SimError;
use crate::isa::fields::opcodes;
use crate::isa::{decode, Decoded, HALT_INSTRUCTION};
use crate::regfile::RegisterFile;
use crate::substrate::Reg;

/// What the CPU asserts to install a new entry at the current tail.
#[derive(Clone, Copy, Debug)]
pub struct RobIssue {
    /// Full 32-bit instruction word (redecoded at commit).
    pub full_instruction: u32,
    /// PC of the instruction, used for branch target recomputation and
    /// jalr's "does the already-fetched successor match" check.
    pub pc: u32,
    /// The predictor's taken/not-taken decision at issue (branches only;
    /// ignored otherwise).
    pub branched: bool,
    /// True for `lui`, which needs no execution unit: ready immediately.
    pub born_ready: bool,
    /// The value to install when `born_ready` (the `lui` immediate).
    pub born_value: u32,
}

struct RobEntry {
    full_instruction: Reg<u32>,
    ready: Reg<bool>,
    value: Reg<u32>,
    pc: Reg<u32>,
    branched: Reg<bool>,
}

impl Default for RobEntry {
    fn default() -> Self {
        Self {
            full_instruction: Reg::default(),
            ready: Reg::default(),
            value: Reg::default(),
            pc: Reg::default(),
            branched: Reg::default(),
        }
    }
}

/// Circular reorder buffer of `length` entries (indices `1..=length` valid).
pub struct Rob {
    head: Reg<usize>,
    tail: Reg<usize>,
    items: Vec<RobEntry>,
    length: usize,
}

impl Rob {
    /// Builds an empty ROB. `length` must be at least 2 — checked by
    /// [`crate::config::Config::validate`] before construction, not here.
    pub fn new(length: usize) -> Self {
        Self {
            head: Reg::new(1),
            tail: Reg::new(1),
            items: (0..=length).map(|_| RobEntry::default()).collect(),
            length,
        }
    }

    fn index_inc(&self, i: usize) -> usize {
        if i == self.length {
            1
        } else {
            i + 1
        }
    }

    /// True when the buffer holds zero in-flight instructions.
    pub fn is_empty(&self) -> bool {
        *self.head.get() == *self.tail.get()
    }

    /// True when advancing `tail` would collide with `head`.
    pub fn is_full(&self) -> bool {
        self.index_inc(*self.tail.get()) == *self.head.get()
    }

    /// The slot a new instruction would occupy this cycle, or `None` if the
    /// ROB is full.
    pub fn issue_slot(&self) -> Option<usize> {
        if self.is_full() {
            None
        } else {
            Some(*self.tail.get())
        }
    }

    /// True if the head entry is valid and ready to retire this cycle.
    pub fn commit(&self) -> bool {
        !self.is_empty() && *self.items[*self.head.get()].ready.get()
    }

    fn head_index(&self) -> usize {
        *self.head.get()
    }

    fn head_decoded(&self) -> Decoded {
        decode(*self.items[self.head_index()].full_instruction.get())
    }

    fn is_jalr_head(&self) -> bool {
        self.head_decoded().opcode == opcodes::JALR
    }

    fn is_branch_head(&self) -> bool {
        self.head_decoded().opcode == opcodes::BRANCH
    }

    fn is_store_head(&self) -> bool {
        self.head_decoded().opcode == opcodes::STORE
    }

    /// Whether the CPU should halt this cycle instead of running pull/update
    /// (§4.9, §6): the head is ready to commit and its instruction is the
    /// fixed halt sentinel.
    pub fn is_halt_ready(&self) -> bool {
        self.commit() && *self.items[self.head_index()].full_instruction.get() == HALT_INSTRUCTION
    }

    /// True iff `tag` denotes a currently in-flight (issued, not yet
    /// committed) entry.
    fn is_in_flight(&self, tag: u32) -> bool {
        if tag == 0 || tag as usize > self.length || self.is_empty() {
            return false;
        }
        let idx = tag as usize;
        let head = *self.head.get();
        let tail = *self.tail.get();
        if head < tail {
            idx >= head && idx < tail
        } else {
            idx >= head || idx < tail
        }
    }

    /// Looks up an in-flight entry's readiness and value by ROB tag, for
    /// operand capture at issue (§4.9). Fails fatally if `tag` does not name
    /// a currently in-flight entry (§7.1's "out-of-range ROB item query") —
    /// callers only ever pass tags taken from a register's rename tag, which
    /// by invariant always names an in-flight entry.
    pub fn query(&self, tag: u32) -> Result<(bool, u32), SimError> {
        if !self.is_in_flight(tag) {
            return Err(SimError::RobIndexOutOfRange {
                index: tag,
                head: *self.head.get(),
                tail: *self.tail.get(),
            });
        }
        let entry = &self.items[tag as usize];
        Ok((*entry.ready.get(), *entry.value.get()))
    }

    /// The head's actual branch outcome and whether it was mispredicted, if
    /// the head commits this cycle and is a branch. Consumed by the branch
    /// predictor's feedback bus and by statistics (§4.8).
    pub fn branch_feedback(&self) -> Option<(u32, bool, bool)> {
        if !self.commit() || !self.is_branch_head() {
            return None;
        }
        let head = &self.items[self.head_index()];
        Some((*head.pc.get(), self.should_branch(), self.is_mispredicted()))
    }

    /// Whether the head commits this cycle as a `jalr`, and if so whether it
    /// was mispredicted (required a flush). Consumed by statistics.
    pub fn jalr_feedback(&self, regs: &RegisterFile) -> Option<bool> {
        if !self.commit() || !self.is_jalr_head() {
            return None;
        }
        let target = self.jalr_target(regs);
        let mispredicted = !matches!(self.next_after_head_pc(), Some(pc) if pc == target);
        Some(mispredicted)
    }

    /// The branch's actual taken/not-taken outcome, derived from the ALU's
    /// remapped-subop result (`value`) per the original (un-remapped) subop.
    /// Only meaningful when the head is a branch.
    fn should_branch(&self) -> bool {
        let head = &self.items[self.head_index()];
        let subop = self.head_decoded().subop;
        let value = *head.value.get();
        match subop {
            0b000 => value == 0,  // beq
            0b001 => value != 0,  // bne
            0b100 => value != 0,  // blt
            0b101 => value == 0,  // bge
            0b110 => value != 0,  // bltu
            0b111 => value == 0,  // bgeu
            _ => false,
        }
    }

    /// Whether the head's predicted direction (`branched`, latched at
    /// issue) disagrees with the actual outcome. Only meaningful when
    /// `commit()` is true and the head is a branch.
    fn is_mispredicted(&self) -> bool {
        if !self.is_branch_head() {
            return false;
        }
        let head = &self.items[self.head_index()];
        *head.branched.get() != self.should_branch()
    }

    fn jalr_target(&self, regs: &RegisterFile) -> u32 {
        let d = self.head_decoded();
        regs.value(d.rs1).wrapping_add(d.imm as u32) & !1u32
    }

    /// The PC of the entry immediately after head, if one is currently
    /// in-flight (i.e. head and tail are not adjacent).
    fn next_after_head_pc(&self) -> Option<u32> {
        let next = self.index_inc(self.head_index());
        if next == *self.tail.get() {
            None
        } else {
            Some(*self.items[next].pc.get())
        }
    }

    /// Load-ordering safety check (§4.4): a load tagged `load_tag` with
    /// resolved address `address` may issue to memory only if no unready
    /// store, nor any store whose resolved address could 4-byte-alias
    /// `address`, sits between the current head and the load's own entry.
    pub fn can_load(&self, load_tag: usize, address: u32) -> bool {
        let mut i = self.index_inc(self.head_index());
        for _ in 0..self.length {
            if i == load_tag {
                break;
            }
            let entry = &self.items[i];
            if decode(*entry.full_instruction.get()).opcode == opcodes::STORE {
                let ready = *entry.ready.get();
                if !ready || address.abs_diff(*entry.value.get()) < 4 {
                    return false;
                }
            }
            i = self.index_inc(i);
        }
        true
    }

    /// The recovery PC to flush to, if the head commits this cycle and is a
    /// mispredicted branch or a jalr whose target disagrees with what was
    /// already speculatively fetched. `None` means no flush.
    pub fn flush_target(&self, regs: &RegisterFile) -> Option<u32> {
        if !self.commit() {
            return None;
        }

        if self.is_branch_head() {
            if !self.is_mispredicted() {
                return None;
            }
            let head = &self.items[self.head_index()];
            let pc = *head.pc.get();
            let d = self.head_decoded();
            let target = if *head.branched.get() {
                pc.wrapping_add(4)
            } else {
                pc.wrapping_add(d.imm as u32)
            };
            return Some(target);
        }

        if self.is_jalr_head() {
            let target = self.jalr_target(regs);
            return match self.next_after_head_pc() {
                Some(pc) if pc == target => None,
                _ => Some(target),
            };
        }

        None
    }

    /// The `(tag, value)` to broadcast on the register commit bus this
    /// cycle, if the head commits and is not a branch or store (branches
    /// write nothing; stores write memory, not a register). `lui`, ALU
    /// results, loads, `jal`, and `jalr`'s link value all flow through
    /// here. The tag is the head's own ROB index: since only the register
    /// that was renamed to this exact index can match, this is safe to
    /// broadcast unconditionally, including when `rd == 0`.
    pub fn commit_value(&self) -> Option<(u32, u32)> {
        if !self.commit() || self.is_branch_head() || self.is_store_head() {
            return None;
        }
        let head = &self.items[self.head_index()];
        Some((self.head_index() as u32, *head.value.get()))
    }

    /// The store to retire to memory this cycle, if the head commits and is
    /// a store. The address was resolved speculatively (via the ALU/CDB,
    /// held in `value`); the data register is read directly from the
    /// architectural file since, by in-order commit, it is guaranteed
    /// resolved by now.
    pub fn store_commit(&self, regs: &RegisterFile) -> Option<StoreCommit> {
        if !self.commit() || !self.is_store_head() {
            return None;
        }
        let d = self.head_decoded();
        let head = &self.items[self.head_index()];
        Some(StoreCommit {
            width: d.subop,
            address: *head.value.get(),
            data: regs.value(d.rs2),
        })
    }

    /// Computes next-cycle state. `cdb` is this cycle's arbitrated
    /// broadcast; `issue` is `Some` iff the CPU is installing a new entry
    /// at the current tail (the caller must have already checked
    /// `issue_slot()`); `clear` is the flush decision for this cycle
    /// (derived from [`Rob::flush_target`] by the CPU driver and fanned out
    /// to every component, this one included). Returns an error if `issue`
    /// is asserted while the ROB is actually full (a fatal invariant
    /// violation, §7.1).
    pub fn pull(&mut self, cdb: CdbPacket, issue: Option<RobIssue>, clear: bool) -> Result<(), SimError> {
        if issue.is_some() && self.is_full() {
            return Err(SimError::RobFull);
        }

        let cur_head = *self.head.get();
        let cur_tail = *self.tail.get();
        let commit = self.commit();

        let next_head = if clear {
            1
        } else if commit {
            self.index_inc(cur_head)
        } else {
            cur_head
        };

        let next_tail = if clear {
            1
        } else if issue.is_some() {
            self.index_inc(cur_tail)
        } else {
            cur_tail
        };

        self.head.set_next(next_head);
        self.tail.set_next(next_tail);

        for i in 1..=self.length {
            let need_update = !clear && issue.is_some() && cur_tail == i;
            let entry = &self.items[i];

            let cur_inst = *entry.full_instruction.get();
            let cur_ready = *entry.ready.get();
            let cur_value = *entry.value.get();
            let cur_pc = *entry.pc.get();
            let cur_branched = *entry.branched.get();

            let (base_inst, base_ready, base_value, base_pc, base_branched) =
                match if need_update { issue } else { None } {
                    Some(iss) => (iss.full_instruction, iss.born_ready, iss.born_value, iss.pc, iss.branched),
                    None => (cur_inst, cur_ready, cur_value, cur_pc, cur_branched),
                };

            let cdb_hit = cdb.tag != 0 && cdb.tag as usize == i;
            let next_ready = cdb_hit || base_ready;
            let next_value = if cdb_hit { cdb.data } else { base_value };

            let entry = &mut self.items[i];
            entry.full_instruction.set_next(base_inst);
            entry.ready.set_next(next_ready);
            entry.value.set_next(next_value);
            entry.pc.set_next(base_pc);
            entry.branched.set_next(base_branched);
        }

        Ok(())
    }

    /// Commits the state staged by [`Rob::pull`].
    pub fn update(&mut self) {
        self.head.update();
        self.tail.update();
        for i in 1..=self.length {
            let entry = &mut self.items[i];
            entry.full_instruction.update();
            entry.ready.update();
            entry.value.update();
            entry.pc.update();
            entry.branched.update();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue_at(rob: &mut Rob, inst: u32, pc: u32) -> usize {
        let slot = rob.issue_slot().expect("room for test issue");
        rob.pull(
            CdbPacket::NONE,
            Some(RobIssue {
                full_instruction: inst,
                pc,
                branched: false,
                born_ready: false,
                born_value: 0,
            }),
            false,
        )
        .unwrap();
        rob.update();
        slot
    }

    #[test]
    fn empty_iff_head_equals_tail() {
        let rob = Rob::new(4);
        assert!(rob.is_empty());
    }

    #[test]
    fn full_detection() {
        let mut rob = Rob::new(2);
        assert_eq!(rob.issue_slot(), Some(1));
        issue_at(&mut rob, 0x13, 0); // addi x0,x0,0 (nop), ALU opcode OP_IMM
        assert!(rob.is_full());
        assert_eq!(rob.issue_slot(), None);
    }

    #[test]
    fn lui_is_born_ready() {
        let mut rob = Rob::new(4);
        let slot = rob.issue_slot().unwrap();
        rob.pull(
            CdbPacket::NONE,
            Some(RobIssue {
                full_instruction: 0x000010B7, // lui x1, 1
                pc: 0,
                branched: false,
                born_ready: true,
                born_value: 0x1000,
            }),
            false,
        )
        .unwrap();
        rob.update();
        assert_eq!(slot, 1);
        assert!(rob.commit());
        assert_eq!(rob.commit_value(), Some((1, 0x1000)));
    }

    #[test]
    fn cdb_resolves_pending_entry() {
        let mut rob = Rob::new(4);
        issue_at(&mut rob, 0b0110011 | (1 << 7), 0); // R-type add, rd=x1
        assert!(!rob.commit());
        rob.pull(CdbPacket { tag: 1, data: 99 }, None, false).unwrap();
        rob.update();
        assert!(rob.commit());
        assert_eq!(rob.commit_value(), Some((1, 99)));
    }

    #[test]
    fn branch_misprediction_flushes_to_not_taken_fallthrough() {
        let mut rob = Rob::new(4);
        let inst = 0b1100011; // beq x0,x0,0: subop 000
        let slot = rob.issue_slot().unwrap();
        rob.pull(
            CdbPacket::NONE,
            Some(RobIssue {
                full_instruction: inst,
                pc: 0x100,
                branched: true, // predicted taken
                born_ready: false,
                born_value: 0,
            }),
            false,
        )
        .unwrap();
        rob.update();
        // resolve: value == 0 means beq is actually equal (should_branch true);
        // predicted taken matches actual -> NOT mispredicted.
        rob.pull(CdbPacket { tag: slot as u32, data: 0 }, None, false).unwrap();
        rob.update();
        let regs = RegisterFile::new();
        assert!(rob.flush_target(&regs).is_none());
    }

    #[test]
    fn branch_misprediction_detected_on_mismatch() {
        let mut rob = Rob::new(4);
        let inst = 0b1100011; // beq, subop 000
        let slot = rob.issue_slot().unwrap();
        rob.pull(
            CdbPacket::NONE,
            Some(RobIssue {
                full_instruction: inst,
                pc: 0x100,
                branched: false, // predicted not-taken
                born_ready: false,
                born_value: 0,
            }),
            false,
        )
        .unwrap();
        rob.update();
        // value == 0 -> actually equal -> should branch, but predicted not-taken.
        rob.pull(CdbPacket { tag: slot as u32, data: 0 }, None, false).unwrap();
        rob.update();
        let regs = RegisterFile::new();
        assert_eq!(rob.flush_target(&regs), Some(0x100));
    }

    #[test]
    fn issuing_into_full_rob_is_fatal() {
        let mut rob = Rob::new(2);
        assert_eq!(rob.issue_slot(), Some(1));
        issue_at(&mut rob, 0x13, 0); // fills the only slot
        assert!(rob.is_full());

        let err = rob
            .pull(
                CdbPacket::NONE,
                Some(RobIssue {
                    full_instruction: 0x13,
                    pc: 4,
                    branched: false,
                    born_ready: false,
                    born_value: 0,
                }),
                false,
            )
            .unwrap_err();
        assert_eq!(err, SimError::RobFull);
    }
}
