use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub mod action;
pub mod actor;
pub mod api;
pub mod check;
pub mod content;
pub mod damage;
pub mod formula;
pub mod path;
pub mod resist;
pub mod target;

pub use action::resolve::{
    AcceptDefaults, MissingActorPolicy, ResolutionOptions, Resolver, RollPrompter,
    TargetAcquisition,
};
pub use action::{ActionArena, ActionData, ActionId, ActionKind, ActionTree, TargetPolicy};
pub use actor::{ActorSnapshot, ItemSnapshot, World};
pub use check::{CheckConfiguration, CheckOptions, CheckOutcome, CheckRoll, RollMode};
pub use damage::{
    DamageComponent, DamageConfiguration, DamageOptions, DamageOutcome, DamageRoll, DamageType,
    TypedDamage,
};
pub use path::OwnerRef;
pub use resist::{RemoteUpdate, ResistanceEntry, UpdateSink};
pub use target::{TargetRecord, TargetRef, TargetSignal, TargetSummary, TargetingSession, Token};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

enum DieSource {
    Seeded(ChaCha8Rng),
    Scripted(VecDeque<i32>),
}

/// Die source for the whole engine: a seeded ChaCha8 stream for real play,
/// or a scripted queue of predetermined results for tests.
pub struct Dice {
    source: DieSource,
}

impl Dice {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            source: DieSource::Seeded(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn from_scripted(rolls: Vec<i32>) -> Self {
        Self {
            source: DieSource::Scripted(rolls.into()),
        }
    }

    /// Roll one die with the given number of faces. An exhausted script
    /// yields 1 so a mis-scripted test fails loudly on totals.
    pub fn roll(&mut self, faces: u32) -> i32 {
        match &mut self.source {
            DieSource::Seeded(rng) => rng.gen_range(1..=faces as i32),
            DieSource::Scripted(queue) => queue.pop_front().unwrap_or(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid formula '{formula}': {reason}")]
    InvalidFormula { formula: String, reason: String },
    #[error("unknown action path '{0}'")]
    UnknownPath(String),
    #[error("no actor resolvable for '{0}'")]
    NoActor(String),
    #[error("no item resolvable for '{0}'")]
    NoItem(String),
}

impl EngineError {
    pub(crate) fn invalid_formula(formula: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormula {
            formula: formula.to_string(),
            reason: reason.into(),
        }
    }
}
