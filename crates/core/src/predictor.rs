//! Branch direction predictors (§4.8).
//!
//! `original_source/predictor.hpp` only carries the two trivial baselines
//! (always/never taken) because the original program picked one at compile
//! time. This simulator exposes all five variants the spec names as a single
//! runtime-selectable [`PredictorKind`], structured the way the teacher's
//! `branch_predictor.rs` keeps its predictor state as plain indexed tables
//! rather than a boxed trait object, since the update/decide pair is small
//! enough that static dispatch through an enum reads more plainly than
//! dynamic dispatch.

/// Which predictor variant to build, and its table-sizing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictorKind {
    /// Always predicts taken.
    AlwaysTaken,
    /// Always predicts not-taken.
    NeverTaken,
    /// `2^index_bits`-entry table of 2-bit saturating counters, indexed by
    /// low PC bits.
    Bimodal {
        /// Number of PC bits used to index the counter table.
        index_bits: u32,
    },
    /// Two-level table: a global history register of `history_bits` bits
    /// selects among `2^history_bits` per-PC-index counter rows.
    Correlating {
        /// Number of PC bits used for the outer index.
        index_bits: u32,
        /// Number of global-history bits used for the inner index.
        history_bits: u32,
    },
    /// A Bimodal and a Correlating sub-predictor, arbitrated by a
    /// `2^chooser_bits`-entry table of saturating counters that tracks which
    /// sub-predictor has been more accurate at each index.
    Tournament {
        /// Index bits shared by both sub-predictors.
        index_bits: u32,
        /// History bits for the Correlating sub-predictor.
        history_bits: u32,
        /// Index bits for the chooser table.
        chooser_bits: u32,
    },
}

impl Default for PredictorKind {
    fn default() -> Self {
        PredictorKind::Bimodal { index_bits: 10 }
    }
}

/// A 2-bit saturating counter: 0-1 predict not-taken, 2-3 predict taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct SatCounter(u8);

impl SatCounter {
    const MAX: u8 = 3;

    fn predict(self) -> bool {
        self.0 >= 2
    }

    fn update(&mut self, taken: bool) {
        if taken {
            self.0 = self.0.saturating_add(1).min(Self::MAX);
        } else {
            self.0 = self.0.saturating_sub(1);
        }
    }
}

/// Runtime predictor state, built from a [`PredictorKind`].
///
/// `decide` must be a pure function of `pc` and current state (the pull-phase
/// rule applies here too: fetch reads the prediction as part of this cycle's
/// pull, and `update` — called only at commit, once the real outcome is
/// known — is the sole place state changes).
#[derive(Debug, Clone)]
pub enum Predictor {
    /// Baseline: every branch predicted taken.
    AlwaysTaken,
    /// Baseline: every branch predicted not-taken.
    NeverTaken,
    /// Per-PC 2-bit counters.
    Bimodal {
        mask: u32,
        table: Vec<SatCounter>,
    },
    /// PAg-style: `2^index_bits` separate per-PC-index history registers,
    /// each selecting a row in one shared `2^history_bits`-entry counter
    /// table (the table is addressed only by the selected history, never by
    /// the PC index itself).
    Correlating {
        index_mask: u32,
        history_mask: u32,
        histories: Vec<u32>,
        table: Vec<SatCounter>,
    },
    /// Bimodal + Correlating sub-predictors, arbitrated by a chooser table.
    Tournament {
        bimodal_mask: u32,
        correlating_index_mask: u32,
        correlating_history_mask: u32,
        chooser_mask: u32,
        bimodal: Vec<SatCounter>,
        correlating_histories: Vec<u32>,
        correlating: Vec<SatCounter>,
        chooser: Vec<SatCounter>,
    },
}

fn table_of_size(bits: u32) -> Vec<SatCounter> {
    vec![SatCounter::default(); 1usize << bits]
}

fn mask_of(bits: u32) -> u32 {
    (1u32 << bits) - 1
}

impl Predictor {
    /// Builds fresh (all-counters-weakly-not-taken, zero-history) predictor
    /// state for the given variant.
    pub fn new(kind: PredictorKind) -> Self {
        match kind {
            PredictorKind::AlwaysTaken => Predictor::AlwaysTaken,
            PredictorKind::NeverTaken => Predictor::NeverTaken,
            PredictorKind::Bimodal { index_bits } => Predictor::Bimodal {
                mask: mask_of(index_bits),
                table: table_of_size(index_bits),
            },
            PredictorKind::Correlating {
                index_bits,
                history_bits,
            } => Predictor::Correlating {
                index_mask: mask_of(index_bits),
                history_mask: mask_of(history_bits),
                histories: vec![0u32; 1usize << index_bits],
                table: table_of_size(history_bits),
            },
            PredictorKind::Tournament {
                index_bits,
                history_bits,
                chooser_bits,
            } => Predictor::Tournament {
                bimodal_mask: mask_of(index_bits),
                correlating_index_mask: mask_of(index_bits),
                correlating_history_mask: mask_of(history_bits),
                chooser_mask: mask_of(chooser_bits),
                bimodal: table_of_size(index_bits),
                correlating_histories: vec![0u32; 1usize << index_bits],
                correlating: table_of_size(history_bits),
                chooser: table_of_size(chooser_bits),
            },
        }
    }

    /// Looks up the PC's own history register and returns `(pc_index,
    /// history_row)` — the shared counter table is addressed by
    /// `history_row` alone, per entry (PAg: per-PC history, globally shared
    /// pattern table).
    fn correlating_row(index_mask: u32, history_mask: u32, histories: &[u32], pc: u32) -> (usize, usize) {
        let pc_index = ((pc >> 2) & index_mask) as usize;
        let row = (histories[pc_index] & history_mask) as usize;
        (pc_index, row)
    }

    /// Predicts whether the branch at `pc` will be taken.
    pub fn decide(&self, pc: u32) -> bool {
        match self {
            Predictor::AlwaysTaken => true,
            Predictor::NeverTaken => false,
            Predictor::Bimodal { mask, table } => {
                table[((pc >> 2) & mask) as usize].predict()
            }
            Predictor::Correlating {
                index_mask,
                history_mask,
                histories,
                table,
            } => {
                let (_, row) = Self::correlating_row(*index_mask, *history_mask, histories, pc);
                table[row].predict()
            }
            Predictor::Tournament {
                bimodal_mask,
                correlating_index_mask,
                correlating_history_mask,
                chooser_mask,
                bimodal,
                correlating_histories,
                correlating,
                chooser,
            } => {
                let bimodal_pred = bimodal[((pc >> 2) & bimodal_mask) as usize].predict();
                let (_, row) =
                    Self::correlating_row(*correlating_index_mask, *correlating_history_mask, correlating_histories, pc);
                let correlating_pred = correlating[row].predict();
                let choose_correlating =
                    chooser[((pc >> 2) & chooser_mask) as usize].predict();
                if choose_correlating {
                    correlating_pred
                } else {
                    bimodal_pred
                }
            }
        }
    }

    /// Feeds back the real outcome of the branch at `pc`, observed at
    /// commit. Only this call mutates predictor state.
    pub fn update(&mut self, pc: u32, taken: bool) {
        match self {
            Predictor::AlwaysTaken | Predictor::NeverTaken => {}
            Predictor::Bimodal { mask, table } => {
                table[((pc >> 2) & *mask) as usize].update(taken);
            }
            Predictor::Correlating {
                index_mask,
                history_mask,
                histories,
                table,
            } => {
                let (pc_index, row) = Self::correlating_row(*index_mask, *history_mask, histories, pc);
                table[row].update(taken);
                histories[pc_index] = ((histories[pc_index] << 1) | u32::from(taken)) & *history_mask;
            }
            Predictor::Tournament {
                bimodal_mask,
                correlating_index_mask,
                correlating_history_mask,
                chooser_mask,
                bimodal,
                correlating_histories,
                correlating,
                chooser,
            } => {
                let bimodal_idx = ((pc >> 2) & *bimodal_mask) as usize;
                let bimodal_pred = bimodal[bimodal_idx].predict();
                let (pc_index, row) =
                    Self::correlating_row(*correlating_index_mask, *correlating_history_mask, correlating_histories, pc);
                let correlating_pred = correlating[row].predict();

                bimodal[bimodal_idx].update(taken);
                correlating[row].update(taken);

                if bimodal_pred != correlating_pred {
                    let chooser_idx = ((pc >> 2) & *chooser_mask) as usize;
                    // Chooser saturates toward Correlating when it alone was
                    // right, toward Bimodal when it alone was right.
                    chooser[chooser_idx].update(correlating_pred == taken);
                }

                correlating_histories[pc_index] =
                    ((correlating_histories[pc_index] << 1) | u32::from(taken)) & *correlating_history_mask;
            }
        }
    }
}
