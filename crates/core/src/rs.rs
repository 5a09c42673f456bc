//! Reservation stations: ALU-class and Mem-class pools (§4.5).
//!
//! Both classes share one station implementation — install-on-issue,
//! snoop-on-CDB, free-on-own-tag — generalized over `bus::RsEntry`, which is
//! grounded on `original_source/rs.hpp`'s `ReservationStation<SpecBus>`
//! template (its single-slot `RSBus` latch and next-value function become
//! this crate's `Station::pull`). The "class" distinction — ALU operands vs.
//! Mem base/offset/data, and the Mem-class's extra ROB load-ordering gate —
//! lives entirely in how each pool turns a ready station into a request, not
//! in the station itself.

use crate::bus::{AluRequest, CdbPacket, MemRequest, RsEntry};
use crate::error::SimError;
use crate::rob::Rob;
use crate::substrate::Reg;

/// A single reservation station slot.
struct Station {
    entry: Reg<RsEntry>,
}

impl Default for Station {
    fn default() -> Self {
        Self {
            entry: Reg::default(),
        }
    }
}

impl Station {
    fn pull(&mut self, index: usize, cdb: CdbPacket, issue: Option<RsEntry>, clear: bool) -> Result<(), SimError> {
        let cur = *self.entry.get();

        let next = if clear {
            RsEntry::default()
        } else if let Some(new_entry) = issue {
            if !cur.is_free() {
                return Err(SimError::ReservationStationBusy { index });
            }
            new_entry
        } else {
            let mut e = cur;
            if cdb.tag != 0 {
                if e.qj == cdb.tag {
                    e.vj = cdb.data;
                    e.qj = 0;
                }
                if e.qk == cdb.tag {
                    e.vk = cdb.data;
                    e.qk = 0;
                }
                if e.tag == cdb.tag {
                    e = RsEntry::default();
                }
            }
            e
        };

        self.entry.set_next(next);
        Ok(())
    }

    fn update(&mut self) {
        self.entry.update();
    }
}

/// A pool of `N` ALU-class or Mem-class stations. Issue picks the
/// lowest-numbered free slot; this is purely a determinism convention (any
/// free slot would be architecturally equivalent).
pub struct StationPool {
    stations: Vec<Station>,
}

impl StationPool {
    /// Builds a pool of `n` empty stations. `n` must be at least 1 — checked
    /// by [`crate::config::Config::validate`].
    pub fn new(n: usize) -> Self {
        Self {
            stations: (0..n).map(|_| Station::default()).collect(),
        }
    }

    /// The lowest-numbered free station, or `None` if the pool is full.
    pub fn free_slot(&self) -> Option<usize> {
        self.stations
            .iter()
            .position(|s| self.entry_of(s).is_free())
    }

    fn entry_of(&self, s: &Station) -> RsEntry {
        *s.entry.get()
    }

    /// Current snapshot of every station's entry, for building requests.
    pub fn entries(&self) -> impl Iterator<Item = RsEntry> + '_ {
        self.stations.iter().map(|s| *s.entry.get())
    }

    /// Computes next-cycle state for every station. `issue` installs a new
    /// entry at the given index this cycle (the caller must have obtained
    /// that index from [`StationPool::free_slot`] beforehand). Returns an
    /// error if `issue` somehow targets a station that isn't actually free
    /// (a fatal invariant violation, §7.1).
    pub fn pull(
        &mut self,
        cdb: CdbPacket,
        issue: Option<(usize, RsEntry)>,
        clear: bool,
    ) -> Result<(), SimError> {
        for (i, station) in self.stations.iter_mut().enumerate() {
            let this_issue = issue.and_then(|(idx, e)| if idx == i { Some(e) } else { None });
            station.pull(i, cdb, this_issue, clear)?;
        }
        Ok(())
    }

    /// Commits the state staged by [`StationPool::pull`].
    pub fn update(&mut self) {
        for station in &mut self.stations {
            station.update();
        }
    }
}

/// Builds the ALU request for each ready ALU-class station this cycle.
/// Non-ready or free stations yield no request. Each station maps 1:1 to an
/// independent ALU execution unit (§2's "ALU execution units" are plural),
/// so there is no further arbitration here — only the global CDB
/// arbitration (lowest tag wins) resolves simultaneous results.
pub fn alu_requests(pool: &StationPool) -> Vec<Option<AluRequest>> {
    pool.entries()
        .map(|e| {
            e.is_ready().then(|| AluRequest {
                tag: e.tag,
                subop: e.subop,
                variant: e.variant,
                vj: e.vj,
                vk: e.vk,
            })
        })
        .collect()
}

/// Builds the memory request for each ready Mem-class station this cycle.
/// Mem-class stations only ever hold loads (§4.9); a request forwards once
/// ready and the ROB's load-ordering check (§4.4) passes.
pub fn mem_requests(pool: &StationPool, rob: &Rob) -> Vec<Option<MemRequest>> {
    pool.entries()
        .map(|e| {
            if !e.is_ready() {
                return None;
            }
            let address = e.vj.wrapping_add(e.imm as u32);
            if !rob.can_load(e.tag as usize, address) {
                return None;
            }
            Some(MemRequest {
                tag: e.tag,
                subop: e.subop,
                address,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_slot_picks_lowest_index() {
        let mut pool = StationPool::new(3);
        assert_eq!(pool.free_slot(), Some(0));
        pool.pull(
            CdbPacket::NONE,
            Some((
                0,
                RsEntry {
                    tag: 5,
                    ..Default::default()
                },
            )),
            false,
        )
        .unwrap();
        pool.update();
        assert_eq!(pool.free_slot(), Some(1));
    }

    #[test]
    fn issuing_into_busy_station_is_fatal() {
        let mut pool = StationPool::new(1);
        pool.pull(
            CdbPacket::NONE,
            Some((
                0,
                RsEntry {
                    tag: 5,
                    ..Default::default()
                },
            )),
            false,
        )
        .unwrap();
        pool.update();

        let err = pool
            .pull(
                CdbPacket::NONE,
                Some((
                    0,
                    RsEntry {
                        tag: 6,
                        ..Default::default()
                    },
                )),
                false,
            )
            .unwrap_err();
        assert_eq!(err, SimError::ReservationStationBusy { index: 0 });
    }

    #[test]
    fn cdb_resolves_operand_and_self_frees_on_own_tag() {
        let mut pool = StationPool::new(1);
        pool.pull(
            CdbPacket::NONE,
            Some((
                0,
                RsEntry {
                    tag: 7,
                    qj: 3,
                    qk: 0,
                    vk: 10,
                    subop: 0,
                    ..Default::default()
                },
            )),
            false,
        )
        .unwrap();
        pool.update();

        pool.pull(CdbPacket { tag: 3, data: 42 }, None, false).unwrap();
        pool.update();
        let e = pool.entries().next().unwrap();
        assert_eq!(e.qj, 0);
        assert_eq!(e.vj, 42);
        assert!(e.is_ready());

        pool.pull(CdbPacket { tag: 7, data: 99 }, None, false).unwrap();
        pool.update();
        assert!(pool.entries().next().unwrap().is_free());
    }

    #[test]
    fn clear_empties_all_stations() {
        let mut pool = StationPool::new(1);
        pool.pull(
            CdbPacket::NONE,
            Some((
                0,
                RsEntry {
                    tag: 7,
                    ..Default::default()
                },
            )),
            false,
        )
        .unwrap();
        pool.update();
        pool.pull(CdbPacket::NONE, None, true).unwrap();
        pool.update();
        assert!(pool.entries().next().unwrap().is_free());
    }
}
