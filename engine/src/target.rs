//! Target acquisition: token geometry, the interactive targeting session,
//! and the per-target accumulator shared across a whole invocation tree.

use std::sync::mpsc::Receiver;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::{ActionId, TargetPolicy};
use crate::check::RollMode;

/// Axis-aligned token footprint on the board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Token {
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x, self.y + self.height),
            (self.x + self.width, self.y + self.height),
        ]
    }
}

/// Smallest distance among the 4x4 corner pairings of two tokens.
pub fn corner_distance(a: &Token, b: &Token) -> f64 {
    let mut best = f64::INFINITY;
    for (ax, ay) in a.corners() {
        for (bx, by) in b.corners() {
            let d = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
            if d < best {
                best = d;
            }
        }
    }
    best
}

pub fn in_range(acting: &Token, candidate: &Token, min: f64, max: f64) -> bool {
    let d = corner_distance(acting, candidate);
    d >= min && d <= max
}

/// One selectable target: a token on the board and its resolved actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRef {
    pub token_id: String,
    pub token: Token,
    pub actor: String,
}

/// Events consumed by an interactive targeting session. Add/Remove mirror
/// left-clicks on candidate tokens, Confirm/Cancel the right-click exits,
/// TemplatePlaced the external spatial tool reporting covered tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetSignal {
    Add(String),
    Remove(String),
    TemplatePlaced(Vec<String>),
    Confirm,
    Cancel,
}

/// Explicit session state for one targeting step. Holds its own candidate
/// list and cancellation flag; nothing here is process-global.
#[derive(Debug)]
pub struct TargetingSession {
    /// Maximum number of targets, None for unbounded.
    pub allowed: Option<usize>,
    /// Minimum selection size a Confirm must carry, None for no floor.
    pub required: Option<usize>,
    pub candidates: Vec<TargetRef>,
    pub selected: Vec<TargetRef>,
    pub cancelled: bool,
    awaiting_template: bool,
}

impl TargetingSession {
    /// Filter candidates down to the ones in range of the acting token and
    /// size the selection limit from the node's policy.
    pub fn new(
        acting: &Token,
        candidates: &[TargetRef],
        policy: &TargetPolicy,
        range: (f64, f64),
        awaiting_template: bool,
    ) -> Self {
        let candidates = if awaiting_template {
            // Template placement defines the area; range gating is the
            // spatial tool's job.
            candidates.to_vec()
        } else {
            candidates
                .iter()
                .filter(|c| in_range(acting, &c.token, range.0, range.1))
                .cloned()
                .collect()
        };
        Self {
            allowed: policy.allowed(),
            required: policy.required(),
            candidates,
            selected: Vec::new(),
            cancelled: false,
            awaiting_template,
        }
    }

    fn candidate(&self, token_id: &str) -> Option<&TargetRef> {
        self.candidates.iter().find(|c| c.token_id == token_id)
    }

    /// Consume signals until the selection is confirmed or cancelled.
    /// Returns the selected targets, or None on cancellation (including a
    /// dropped sender, which counts as cancelled).
    pub fn run(&mut self, signals: &Receiver<TargetSignal>) -> Option<Vec<TargetRef>> {
        while let Ok(signal) = signals.recv() {
            match signal {
                TargetSignal::Add(token_id) => {
                    if self.awaiting_template {
                        continue;
                    }
                    let full = self.allowed.is_some_and(|n| self.selected.len() >= n);
                    if full || self.selected.iter().any(|t| t.token_id == token_id) {
                        continue;
                    }
                    if let Some(target) = self.candidate(&token_id) {
                        self.selected.push(target.clone());
                    }
                }
                TargetSignal::Remove(token_id) => {
                    self.selected.retain(|t| t.token_id != token_id);
                }
                TargetSignal::TemplatePlaced(token_ids) => {
                    if !self.awaiting_template {
                        continue;
                    }
                    let selected: Vec<TargetRef> = token_ids
                        .iter()
                        .filter_map(|id| self.candidate(id).cloned())
                        .collect();
                    self.selected = selected;
                    return Some(self.selected.clone());
                }
                TargetSignal::Confirm => {
                    // An underfull Confirm is ignored; the session stays open.
                    if self.required.is_some_and(|min| self.selected.len() < min) {
                        continue;
                    }
                    return Some(self.selected.clone());
                }
                TargetSignal::Cancel => {
                    self.cancelled = true;
                    return None;
                }
            }
        }
        self.cancelled = true;
        None
    }
}

/// Stats written by one action node for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStat {
    pub action_name: String,
    pub hit: bool,
    pub defence_value: Option<i32>,
    pub attack_total: Option<i32>,
    pub damage: Option<i32>,
    /// Visibility of the roll behind this stat, when one was made.
    pub roll_mode: Option<RollMode>,
}

/// Accumulator for one target across the whole invocation tree. The stat
/// map is ordered; aggregation depends on depth-first insertion order.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub target: TargetRef,
    pub stats: IndexMap<ActionId, ActionStat>,
}

impl TargetRecord {
    pub fn new(target: TargetRef) -> Self {
        Self {
            target,
            stats: IndexMap::new(),
        }
    }
}

/// Shared per-invocation target map, keyed by token id.
pub type TargetMap = IndexMap<String, TargetRecord>;

pub fn wrap_targets(targets: Vec<TargetRef>) -> TargetMap {
    targets
        .into_iter()
        .map(|t| (t.token_id.clone(), TargetRecord::new(t)))
        .collect()
}

/// Final per-target summary emitted by the root node for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub token_id: String,
    pub actor: String,
    pub damage: Vec<i32>,
    pub attack: Vec<i32>,
    pub defence: Vec<i32>,
    pub hit: Vec<bool>,
    pub roll_modes: Vec<RollMode>,
}

pub fn summarize(targets: &TargetMap) -> Vec<TargetSummary> {
    targets
        .values()
        .map(|record| {
            let mut summary = TargetSummary {
                token_id: record.target.token_id.clone(),
                actor: record.target.actor.clone(),
                damage: Vec::new(),
                attack: Vec::new(),
                defence: Vec::new(),
                hit: Vec::new(),
                roll_modes: Vec::new(),
            };
            for stat in record.stats.values() {
                summary.hit.push(stat.hit);
                if let Some(damage) = stat.damage {
                    summary.damage.push(damage);
                }
                if let Some(attack) = stat.attack_total {
                    summary.attack.push(attack);
                }
                if let Some(defence) = stat.defence_value {
                    summary.defence.push(defence);
                }
                if let Some(mode) = stat.roll_mode {
                    summary.roll_modes.push(mode);
                }
            }
            summary
        })
        .collect()
}
