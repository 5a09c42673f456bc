//! Top-level wiring: fetch, decode, issue, CDB arbitration, commit (§4.9).
//!
//! Every other module in this crate is a pure `pull`/`update` component; this
//! one is the driver that owns them all and sequences exactly one pull pass
//! followed by one update pass per [`Cpu::step`], per `original_source`'s
//! `CPU::run_cycle` (fetch/issue/arbitrate/commit all inlined into one
//! top-level routine rather than split across files).

use crate::alu::Alu;
use crate::bus::{CdbPacket, MemRequest, RsEntry};
use crate::config::{Config, MemoryConfig};
use crate::error::SimError;
use crate::image::MemoryImage;
use crate::isa::fields::opcodes;
use crate::isa::{decode, Decoded, Format};
use crate::memory::{CacheParams, Memory};
use crate::predictor::Predictor;
use crate::regfile::{RegIssue, RegisterFile};
use crate::rob::{Rob, RobIssue};
use crate::rs::{alu_requests, mem_requests, StationPool};
use crate::stats::Stats;
use crate::substrate::Reg;
use tracing::{debug, error, trace, warn};

/// Which execution unit class, if any, an instruction needs (§4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExecuteType {
    /// `lui`: no execution unit, born ready with its immediate as value.
    None_,
    /// Loads: routed through the memory unit.
    Mem,
    /// Everything else that produces a value, including stores' address
    /// computation and branches' comparison.
    Alu,
}

fn execute_type(opcode: u32) -> ExecuteType {
    match opcode {
        opcodes::LUI => ExecuteType::None_,
        opcodes::LOAD => ExecuteType::Mem,
        _ => ExecuteType::Alu,
    }
}

/// Remaps a branch's raw subop to the ALU subop/variant that computes its
/// comparison, and the original subop is kept separately by the ROB for
/// interpreting the result (§4.9's remap table).
fn branch_alu_op(subop: u8) -> (u8, bool) {
    match subop {
        0b000 | 0b001 => (0b000, true), // beq/bne -> sub
        0b100 | 0b101 => (0b010, false), // blt/bge -> slt
        _ => (0b011, false),             // bltu/bgeu -> sltu
    }
}

/// The superscalar out-of-order core: every component plus the driver state
/// (`pc`) that ties them together each cycle.
pub struct Cpu {
    pc: Reg<u32>,
    regs: RegisterFile,
    rob: Rob,
    alu_rs: StationPool,
    mem_rs: StationPool,
    alus: Vec<Alu>,
    memory: Memory,
    predictor: Predictor,
    stats: Stats,
}

impl Cpu {
    /// Builds a fresh core over `image`, configured per `config`. PC starts
    /// at 0. `config` is assumed already [`Config::validate`]d by the
    /// caller.
    pub fn new(config: &Config, image: &MemoryImage) -> Self {
        let memory = match config.memory {
            MemoryConfig::Plain { delay } => Memory::plain(image, delay),
            MemoryConfig::Cache {
                set_bits,
                ways,
                block_bits,
                hit_delay,
                miss_delay,
            } => Memory::cached(
                image,
                CacheParams {
                    set_bits,
                    ways,
                    block_bits,
                    hit_delay,
                    miss_delay,
                },
            ),
        };

        Self {
            pc: Reg::new(0),
            regs: RegisterFile::new(),
            rob: Rob::new(config.rob_len),
            alu_rs: StationPool::new(config.n_alu_rs),
            mem_rs: StationPool::new(config.n_mem_rs),
            alus: (0..config.n_alu_rs).map(|_| Alu::new()).collect(),
            memory,
            predictor: Predictor::new(config.predictor),
            stats: Stats::default(),
        }
    }

    /// Telemetry collected so far (§6 "profile knob").
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Reads an operand as issue would (§4.9 "Operand capture"): the
    /// register's value if architectural, else the resolving ROB entry's
    /// value if already ready, else this cycle's live CDB broadcast if it
    /// matches, else the producer's tag to forward unresolved.
    fn capture_operand(&self, reg: u8, cdb: CdbPacket) -> Result<(u32, u32), SimError> {
        let (tag, value) = self.regs.read(reg);
        if tag == 0 {
            return Ok((0, value));
        }
        let (ready, rob_value) = self.rob.query(tag)?;
        if ready {
            return Ok((0, rob_value));
        }
        if cdb.tag == tag {
            return Ok((0, cdb.data));
        }
        Ok((tag, 0))
    }

    /// Assembles the reservation-station entry a new issue installs, per
    /// format (§4.9 "RS bus payload"). Returns `None` for `lui`, which needs
    /// no station.
    fn build_rs_entry(&self, d: &Decoded, pc: u32, new_tag: u32, cdb: CdbPacket) -> Result<Option<RsEntry>, SimError> {
        let entry = match d.opcode {
            opcodes::LUI => return Ok(None),

            opcodes::LOAD => {
                let (qj, vj) = self.capture_operand(d.rs1, cdb)?;
                RsEntry {
                    tag: new_tag,
                    qj,
                    qk: 0,
                    vj,
                    vk: 0,
                    subop: d.subop,
                    variant: false,
                    imm: d.imm,
                }
            }

            opcodes::STORE => {
                let (qj, vj) = self.capture_operand(d.rs1, cdb)?;
                RsEntry {
                    tag: new_tag,
                    qj,
                    qk: 0,
                    vj,
                    vk: d.imm as u32,
                    subop: 0b000,
                    variant: false,
                    imm: 0,
                }
            }

            opcodes::BRANCH => {
                let (qj, vj) = self.capture_operand(d.rs1, cdb)?;
                let (qk, vk) = self.capture_operand(d.rs2, cdb)?;
                let (subop, variant) = branch_alu_op(d.subop);
                RsEntry { tag: new_tag, qj, qk, vj, vk, subop, variant, imm: 0 }
            }

            opcodes::JAL | opcodes::JALR => RsEntry {
                tag: new_tag,
                qj: 0,
                qk: 0,
                vj: pc,
                vk: 4,
                subop: 0b000,
                variant: false,
                imm: 0,
            },

            opcodes::AUIPC => RsEntry {
                tag: new_tag,
                qj: 0,
                qk: 0,
                vj: pc,
                vk: d.imm as u32,
                subop: 0b000,
                variant: false,
                imm: 0,
            },

            opcodes::OP_IMM => {
                let (qj, vj) = self.capture_operand(d.rs1, cdb)?;
                RsEntry {
                    tag: new_tag,
                    qj,
                    qk: 0,
                    vj,
                    vk: d.imm as u32,
                    subop: d.subop,
                    variant: d.variant,
                    imm: 0,
                }
            }

            opcodes::OP => {
                let (qj, vj) = self.capture_operand(d.rs1, cdb)?;
                let (qk, vk) = self.capture_operand(d.rs2, cdb)?;
                RsEntry { tag: new_tag, qj, qk, vj, vk, subop: d.subop, variant: d.variant, imm: 0 }
            }

            _ => return Ok(None),
        };
        Ok(Some(entry))
    }

    /// Arbitrates one broadcast from all CDB sources this cycle: lowest
    /// nonzero tag wins (§4.9 "CDB arbitration").
    fn arbitrate_cdb(&self) -> CdbPacket {
        let mut best = CdbPacket::NONE;
        for packet in std::iter::once(self.memory.cdb_out()).chain(self.alus.iter().map(Alu::cdb_out)) {
            if packet.tag == 0 {
                continue;
            }
            if best.tag == 0 || packet.tag < best.tag {
                best = packet;
            }
        }
        best
    }

    /// Runs one cycle. Returns `Some(exit_code)` if the halt sentinel is
    /// ready to commit at the ROB head this cycle (checked *before* doing
    /// any pull/update work, per §4.9/§6); otherwise runs pull-then-update
    /// over every component and returns `None`.
    pub fn step(&mut self) -> Result<Option<u8>, SimError> {
        self.step_inner().inspect_err(|err| error!(%err, "fatal invariant violated, aborting run"))
    }

    fn step_inner(&mut self) -> Result<Option<u8>, SimError> {
        if self.rob.is_halt_ready() {
            return Ok(Some((self.regs.value(10) & 0xFF) as u8));
        }

        let flush_target = self.rob.flush_target(&self.regs);
        let clear = flush_target.is_some();
        if let Some(target) = flush_target {
            debug!(cycle = self.stats.cycles, target, "flushing: misprediction or jalr target mismatch at commit");
        }

        let cur_pc = *self.pc.get();
        let full_instruction = self.memory.fetch(cur_pc);
        let decoded = decode(full_instruction);

        let alu_free_slot = self.alu_rs.free_slot();
        let mem_free_slot = self.mem_rs.free_slot();
        let class_free = match execute_type(decoded.opcode) {
            ExecuteType::None_ => true,
            ExecuteType::Alu => alu_free_slot.is_some(),
            ExecuteType::Mem => mem_free_slot.is_some(),
        };
        let can_issue = !clear && decoded.format != Format::Unknown && self.rob.issue_slot().is_some() && class_free;
        trace!(cycle = self.stats.cycles, pc = cur_pc, inst = full_instruction, issuing = can_issue, "cycle");
        if !can_issue && !clear {
            if decoded.format == Format::Unknown {
                warn!(pc = cur_pc, inst = full_instruction, "unrecognized opcode: forward progress halted");
            } else {
                warn!(pc = cur_pc, "stall: no free ROB slot or reservation station this cycle");
            }
        }

        let cdb = self.arbitrate_cdb();

        let predicted_taken = decoded.opcode == opcodes::BRANCH && self.predictor.decide(cur_pc);

        let next_pc = if let Some(target) = flush_target {
            target
        } else if !can_issue {
            cur_pc
        } else {
            match decoded.opcode {
                opcodes::JAL => cur_pc.wrapping_add(decoded.imm as u32),
                opcodes::BRANCH if predicted_taken => cur_pc.wrapping_add(decoded.imm as u32),
                _ => cur_pc.wrapping_add(4),
            }
        };

        let new_tag = self.rob.issue_slot().unwrap_or(0) as u32;
        let rs_entry = if can_issue {
            self.build_rs_entry(&decoded, cur_pc, new_tag, cdb)?
        } else {
            None
        };

        let execute_kind = execute_type(decoded.opcode);
        let rob_issue = can_issue.then(|| RobIssue {
            full_instruction,
            pc: cur_pc,
            branched: predicted_taken,
            born_ready: execute_kind == ExecuteType::None_,
            born_value: if execute_kind == ExecuteType::None_ { decoded.imm as u32 } else { 0 },
        });
        let reg_issue = can_issue.then(|| RegIssue { rd: decoded.rd, tag: new_tag });

        let alu_issue = if can_issue && execute_kind == ExecuteType::Alu {
            rs_entry.zip(alu_free_slot).map(|(e, idx)| (idx, e))
        } else {
            None
        };
        let mem_issue = if can_issue && execute_kind == ExecuteType::Mem {
            rs_entry.zip(mem_free_slot).map(|(e, idx)| (idx, e))
        } else {
            None
        };

        let alu_requests_vec = alu_requests(&self.alu_rs);
        let mem_request: Option<MemRequest> = mem_requests(&self.mem_rs, &self.rob).into_iter().flatten().next();

        let branch_feedback = self.rob.branch_feedback();
        let jalr_mispredicted = self.rob.jalr_feedback(&self.regs);
        let commit_this_cycle = self.rob.commit();
        let commit_value = self.rob.commit_value();
        let store = self.rob.store_commit(&self.regs);

        for (alu, request) in self.alus.iter_mut().zip(alu_requests_vec) {
            alu.pull(request, cdb, clear)?;
        }
        self.memory.pull(mem_request, cdb, clear)?;
        let cache_hit = self.memory.last_cache_hit();

        self.rob.pull(cdb, rob_issue, clear)?;
        self.regs.pull(reg_issue, commit_value, clear);
        self.alu_rs.pull(cdb, alu_issue, clear)?;
        self.mem_rs.pull(cdb, mem_issue, clear)?;
        self.pc.set_next(next_pc);

        if let Some((branch_pc, taken, mispredicted)) = branch_feedback {
            self.predictor.update(branch_pc, taken);
            self.stats.record_branch(mispredicted);
        }
        if let Some(mispredicted) = jalr_mispredicted {
            self.stats.record_jalr(mispredicted);
        }
        if let Some(hit) = cache_hit {
            self.stats.record_cache_access(hit);
        }
        if commit_this_cycle {
            self.stats.instructions_retired += 1;
        }
        self.stats.cycles += 1;

        for alu in &mut self.alus {
            alu.update();
        }
        self.memory.update();
        if let Some(store) = store {
            self.memory.commit_store(store);
        }
        self.rob.update();
        self.regs.update();
        self.alu_rs.update();
        self.mem_rs.update();
        self.pc.update();

        Ok(None)
    }

    /// Runs until halt, returning the program's exit value (§6 "Exit
    /// channel").
    pub fn run(&mut self) -> Result<u8, SimError> {
        loop {
            if let Some(exit) = self.step()? {
                return Ok(exit);
            }
        }
    }
}
