//! Architectural register file with Tomasulo-style rename tags (§4.3).
//!
//! Each of the 32 registers carries both its last-committed value and a tag:
//! zero when the value is architecturally valid, or the ROB index of the
//! in-flight instruction that will next write it. Grounded on
//! `original_source/regs.hpp`'s `Regs` class, re-expressed over this crate's
//! [`crate::substrate::Reg`] double-buffered cells instead of stored
//! closures, and on the teacher's `Scoreboard` for the "tag, not closure"
//! framing of rename state (`core/pipeline/scoreboard.rs`). `x0` is excluded
//! from both tables: it is always zero and never renamed.

use crate::substrate::Reg;

/// What issue asserts this cycle: the destination register being renamed and
/// the ROB tag it is renamed to. `rd == 0` is a no-op (x0 is never renamed).
#[derive(Clone, Copy, Debug)]
pub struct RegIssue {
    /// Destination register index.
    pub rd: u8,
    /// ROB tag of the issuing instruction.
    pub tag: u32,
}

/// 32 general-purpose registers plus their rename tags.
pub struct RegisterFile {
    values: [Reg<u32>; 32],
    tags: [Reg<u32>; 32],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// All registers zero, all tags clear.
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| Reg::default()),
            tags: std::array::from_fn(|_| Reg::default()),
        }
    }

    /// Current architectural value of register `i` (`0` is always `0`).
    pub fn value(&self, i: u8) -> u32 {
        if i == 0 {
            0
        } else {
            *self.values[i as usize].get()
        }
    }

    /// Current rename tag of register `i`, or `0` if its value is
    /// architecturally valid (`0` is always untagged).
    pub fn tag(&self, i: u8) -> u32 {
        if i == 0 {
            0
        } else {
            *self.tags[i as usize].get()
        }
    }

    /// Reads an operand as issue would: a tag if the register is still
    /// awaiting a producer, or the value directly.
    pub fn read(&self, i: u8) -> (u32, u32) {
        (self.tag(i), self.value(i))
    }

    /// Computes next-cycle state from this cycle's issue rename and CDB
    /// commit broadcast, per the two-phase pull/update discipline: reads
    /// only current state, stages results via `set_next`, commits nothing
    /// until [`RegisterFile::update`] runs.
    ///
    /// `issue` renames `rd` to `tag` unless `rd == 0`. `commit` writes `data`
    /// into every register whose tag equals `tag` (normally just one, since
    /// a tag uniquely identifies its producer) and, unless overridden by this
    /// same cycle's issue, clears that tag back to architectural. `clear`
    /// (a pipeline flush) wins over both: every tag resets to 0, but
    /// committed values this same cycle are still applied first so a
    /// same-cycle commit-then-flush doesn't lose its result.
    pub fn pull(&mut self, issue: Option<RegIssue>, commit: Option<(u32, u32)>, clear: bool) {
        for i in 1..32usize {
            let cur_tag = *self.tags[i].get();
            let cur_val = *self.values[i].get();

            let next_val = match commit {
                Some((tag, data)) if tag != 0 && cur_tag == tag => data,
                _ => cur_val,
            };

            let next_tag = if clear {
                0
            } else if let Some(iss) = issue.filter(|iss| iss.rd as usize == i) {
                iss.tag
            } else {
                match commit {
                    Some((tag, _)) if tag != 0 && cur_tag == tag => 0,
                    _ => cur_tag,
                }
            };

            self.values[i].set_next(next_val);
            self.tags[i].set_next(next_tag);
        }
    }

    /// Commits the state staged by [`RegisterFile::pull`].
    pub fn update(&mut self) {
        for i in 1..32usize {
            self.values[i].update();
            self.tags[i].update();
        }
    }
}
