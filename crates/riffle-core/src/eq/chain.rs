//! Equalizer chain: fixed arena of 10 filter stages in series
//!
//!   preamp → stage 0 → stage 1 → … → stage 9 → master gain
//!
//! Stages are never created or destroyed individually. A slot is either
//! updated in place, or, when its variant changes, substituted at the same
//! position. Because the signal path is the arena order itself, a substituted
//! stage is linked to the same upstream and downstream neighbors as its
//! predecessor within the same sample boundary.

use super::band::MAX_BANDS;
use super::stage::{FilterStage, StageConfig};
use crate::types::StereoSample;

/// A node adjacent to a stage slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Preamp,
    Stage(usize),
    Master,
}

impl std::fmt::Display for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Link::Preamp => write!(f, "preamp"),
            Link::Stage(i) => write!(f, "stage {}", i),
            Link::Master => write!(f, "master"),
        }
    }
}

/// Outcome of configuring a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconfigure {
    /// Same variant, parameters or coefficients updated in place
    InPlace,
    /// New variant installed between `upstream` and `downstream`
    Substituted { upstream: Link, downstream: Link },
    /// Slot index out of range
    Ignored,
}

/// The render-side stage arena
pub struct EqChain {
    stages: [FilterStage; MAX_BANDS],
    smoothing_ms: f32,
    sample_rate: f64,
}

impl EqChain {
    /// Create a chain of neutral stages
    pub fn new(smoothing_ms: f32, sample_rate: f64) -> Self {
        Self {
            stages: std::array::from_fn(|_| FilterStage::neutral(smoothing_ms, sample_rate)),
            smoothing_ms,
            sample_rate,
        }
    }

    /// Upstream and downstream neighbors of a slot
    pub fn neighbors(slot: usize) -> (Link, Link) {
        let upstream = if slot == 0 {
            Link::Preamp
        } else {
            Link::Stage(slot - 1)
        };
        let downstream = if slot + 1 >= MAX_BANDS {
            Link::Master
        } else {
            Link::Stage(slot + 1)
        };
        (upstream, downstream)
    }

    /// Reconcile one slot with its desired configuration
    pub fn configure(&mut self, slot: usize, config: &StageConfig) -> Reconfigure {
        let Some(stage) = self.stages.get_mut(slot) else {
            return Reconfigure::Ignored;
        };
        if stage.apply(config) {
            return Reconfigure::InPlace;
        }

        stage.substitute(config, self.smoothing_ms, self.sample_rate);
        let (upstream, downstream) = Self::neighbors(slot);
        Reconfigure::Substituted {
            upstream,
            downstream,
        }
    }

    pub fn stage(&self, slot: usize) -> Option<&FilterStage> {
        self.stages.get(slot)
    }

    /// Run all stages in order over `samples`
    pub fn process(&mut self, samples: &mut [StereoSample]) {
        for stage in &mut self.stages {
            stage.process(samples);
        }
    }
}
