//! Optional run telemetry (§6 "profile knob", §4.8 "statistics counters").
//!
//! Scaled down from the teacher's `SimStats`/`print_sections` (cycle
//! count, IPC, branch accuracy, and cache hit rate survive; the
//! kernel-mode/FP/multi-level-cache sections do not, since this simulator
//! has none of that to report) but keeping its plain-struct-plus-`print`
//! shape and terminal formatting style.

/// Cycle, instruction, branch-prediction, and cache counters collected when
/// the CLI's `--profile` flag is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    /// Total cycles simulated.
    pub cycles: u64,
    /// Instructions retired (ROB commits).
    pub instructions_retired: u64,
    /// Branch predictions that matched the actual outcome.
    pub branch_correct: u64,
    /// Branch predictions that were wrong (triggered a flush).
    pub branch_mispredicted: u64,
    /// `jalr` commits whose already-fetched successor matched the
    /// computed target (no flush needed).
    pub jalr_correct: u64,
    /// `jalr` commits that required a flush.
    pub jalr_mispredicted: u64,
    /// Data-memory accesses that hit in the cache (0 if uncached).
    pub cache_hits: u64,
    /// Data-memory accesses that missed in the cache (0 if uncached).
    pub cache_misses: u64,
}

impl Stats {
    /// Records a committed branch's prediction outcome.
    pub fn record_branch(&mut self, mispredicted: bool) {
        if mispredicted {
            self.branch_mispredicted += 1;
        } else {
            self.branch_correct += 1;
        }
    }

    /// Records a committed `jalr`'s target-match outcome.
    pub fn record_jalr(&mut self, mispredicted: bool) {
        if mispredicted {
            self.jalr_mispredicted += 1;
        } else {
            self.jalr_correct += 1;
        }
    }

    /// Records a data-memory access's cache outcome.
    pub fn record_cache_access(&mut self, hit: bool) {
        if hit {
            self.cache_hits += 1;
        } else {
            self.cache_misses += 1;
        }
    }

    /// Prints a summary to stdout, in the teacher's labeled-line style.
    pub fn print(&self) {
        let cyc = self.cycles.max(1);
        let ipc = self.instructions_retired as f64 / cyc as f64;

        println!("==========================================================");
        println!("SIMULATION STATISTICS");
        println!("==========================================================");
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_ipc                  {ipc:.4}");

        let branch_total = self.branch_correct + self.branch_mispredicted;
        if branch_total > 0 {
            let acc = 100.0 * self.branch_correct as f64 / branch_total as f64;
            println!("----------------------------------------------------------");
            println!("bp.branches              {branch_total}");
            println!("bp.mispredicts           {}", self.branch_mispredicted);
            println!("bp.accuracy              {acc:.2}%");
        }

        let jalr_total = self.jalr_correct + self.jalr_mispredicted;
        if jalr_total > 0 {
            println!("bp.jalrs                 {jalr_total}");
            println!("bp.jalr_mispredicts      {}", self.jalr_mispredicted);
        }

        let cache_total = self.cache_hits + self.cache_misses;
        if cache_total > 0 {
            let rate = 100.0 * self.cache_hits as f64 / cache_total as f64;
            println!("----------------------------------------------------------");
            println!("dcache.accesses          {cache_total}");
            println!("dcache.hit_rate          {rate:.2}%");
        }
        println!("==========================================================");
    }
}
