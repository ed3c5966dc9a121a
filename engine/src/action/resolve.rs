//! Recursive resolution of an action tree.
//!
//! One invocation walks the tree depth-first, pre-order: acquire targets,
//! roll against them, write per-target stats, then branch into children
//! gated by the hit outcome. The target map is shared by reference across
//! the whole tree so accumulation is cumulative and ordered.

use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ActionArena, ActionData, ActionId, ActionKind};
use crate::actor::World;
use crate::check::{CheckConfiguration, CheckOptions, CheckOutcome, CheckRoll};
use crate::damage::{DamageComponent, DamageConfiguration, DamageOptions, DamageRoll};
use crate::formula;
use crate::path::OwnerRef;
use crate::resist::{UpdateSink, apply_damage};
use crate::target::{
    ActionStat, TargetMap, TargetRef, TargetSignal, TargetSummary, TargetingSession, Token,
    summarize, wrap_targets,
};
use crate::{Dice, EngineError};

/// Lifecycle of one node's resolution; used for tracing only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Templating,
    Targeting,
    Rolling,
    Branching,
    Finished,
}

/// What to do when a node's owning actor cannot be resolved. The silent
/// default mirrors long-standing behaviour; Error surfaces it instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingActorPolicy {
    #[default]
    Silent,
    Error,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionOptions {
    #[serde(default)]
    pub missing_actor: MissingActorPolicy,
    /// Whether the caller may mutate actor health directly; otherwise
    /// updates go out as remote-update messages.
    #[serde(default = "default_true")]
    pub authority: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            missing_actor: MissingActorPolicy::Silent,
            authority: true,
        }
    }
}

/// Collaborator that supplies dialog-confirmed roll configuration.
/// Returning None means the dialog was dismissed: the node's resolution
/// (and its subtree) is aborted for this invocation.
pub trait RollPrompter {
    fn configure_check(
        &mut self,
        action: &ActionData,
        roll: &CheckRoll,
    ) -> Option<CheckConfiguration>;

    fn configure_damage(
        &mut self,
        action: &ActionData,
        roll: &DamageRoll,
    ) -> Option<DamageConfiguration>;
}

/// Prompter that confirms every dialog with its defaults.
#[derive(Debug, Default)]
pub struct AcceptDefaults;

impl RollPrompter for AcceptDefaults {
    fn configure_check(&mut self, _: &ActionData, _: &CheckRoll) -> Option<CheckConfiguration> {
        Some(CheckConfiguration::default())
    }

    fn configure_damage(&mut self, _: &ActionData, _: &DamageRoll) -> Option<DamageConfiguration> {
        Some(DamageConfiguration::default())
    }
}

/// How the root node gets its targets: an explicit set handed over by the
/// host, or an interactive session fed by a signal channel.
pub enum TargetAcquisition<'s> {
    Explicit(Vec<TargetRef>),
    Interactive {
        acting: Token,
        candidates: Vec<TargetRef>,
        signals: &'s Receiver<TargetSignal>,
    },
}

pub struct Resolver<'a> {
    arena: &'a ActionArena,
    world: &'a mut World,
    dice: &'a mut Dice,
    prompter: &'a mut dyn RollPrompter,
    updates: &'a mut dyn UpdateSink,
    options: ResolutionOptions,
    pub log: Vec<String>,
    owner_actor: Option<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        arena: &'a ActionArena,
        world: &'a mut World,
        dice: &'a mut Dice,
        prompter: &'a mut dyn RollPrompter,
        updates: &'a mut dyn UpdateSink,
        options: ResolutionOptions,
    ) -> Self {
        Self {
            arena,
            world,
            dice,
            prompter,
            updates,
            options,
            log: Vec::new(),
            owner_actor: None,
        }
    }

    /// Resolve a root node against acquired targets. Returns None when the
    /// invocation was aborted (cancelled targeting or configuration, or an
    /// unresolvable owner under the silent policy), otherwise one summary
    /// per target.
    pub fn resolve(
        &mut self,
        root: ActionId,
        acquisition: TargetAcquisition<'_>,
    ) -> Result<Option<Vec<TargetSummary>>, EngineError> {
        let root_data = self
            .arena
            .get(root)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPath(format!("action #{}", root.0)))?;

        self.owner_actor = self.world.resolve_owner(self.arena.owner());
        if self.owner_actor.is_none() {
            let prefix = self.arena.owner().prefix();
            match self.options.missing_actor {
                MissingActorPolicy::Silent => {
                    debug!(owner = %prefix, "owner unresolved; resolution is a no-op");
                    self.log.push(format!("[SKIP] no actor for {}", prefix));
                    return Ok(None);
                }
                MissingActorPolicy::Error => {
                    return Err(match self.arena.owner() {
                        OwnerRef::Item(item_ref) if !self.world.items.contains_key(item_ref) => {
                            EngineError::NoItem(item_ref.clone())
                        }
                        _ => EngineError::NoActor(prefix),
                    });
                }
            }
        }

        let mut targets: TargetMap = match acquisition {
            TargetAcquisition::Explicit(list) => wrap_targets(list),
            TargetAcquisition::Interactive {
                acting,
                candidates,
                signals,
            } => {
                let phase = if root_data.template.is_some() {
                    Phase::Templating
                } else {
                    Phase::Targeting
                };
                debug!(action = %root_data.name, ?phase, "awaiting target selection");
                let mut session = TargetingSession::new(
                    &acting,
                    &candidates,
                    &root_data.target_policy,
                    root_data.range,
                    root_data.template.is_some(),
                );
                match session.run(signals) {
                    Some(selected) => wrap_targets(selected),
                    None => {
                        self.log
                            .push(format!("[CANCEL][{}] targeting cancelled", root_data.name));
                        return Ok(None);
                    }
                }
            }
        };

        let eligible: Vec<String> = targets.keys().cloned().collect();
        self.resolve_node(root, &mut targets, &eligible)?;

        debug!(action = %root_data.name, phase = ?Phase::Finished, "aggregating");
        let summaries = summarize(&targets);
        self.log.push(format!(
            "[DONE][{}] {} target(s) resolved",
            root_data.name,
            summaries.len()
        ));
        Ok(Some(summaries))
    }

    fn resolve_node(
        &mut self,
        id: ActionId,
        targets: &mut TargetMap,
        eligible: &[String],
    ) -> Result<(), EngineError> {
        let Some(data) = self.arena.get(id).cloned() else {
            return Ok(());
        };
        debug!(action = %data.name, kind = ?data.kind, phase = ?Phase::Rolling, targets = eligible.len(), "resolving");
        self.spend_cost(&data);

        let completed = match data.kind {
            ActionKind::Common => self.roll_common(id, &data, targets, eligible)?,
            ActionKind::Attack => self.roll_attack(id, &data, targets, eligible)?,
            ActionKind::Damage => self.roll_damage(id, &data, targets, eligible)?,
        };
        if !completed {
            // Cancelled configuration: no stats, no children.
            return Ok(());
        }

        debug!(action = %data.name, phase = ?Phase::Branching, "branching");
        let hit: Vec<String> = eligible
            .iter()
            .filter(|tid| {
                targets
                    .get(tid.as_str())
                    .and_then(|record| record.stats.get(&id))
                    .is_some_and(|stat| stat.hit)
            })
            .cloned()
            .collect();

        let children = self.arena.children(id).to_vec();
        for child in children {
            let Some(child_data) = self.arena.get(child) else {
                continue;
            };
            // A failed branch still carries use_on_fail children; everyone
            // else narrows to the targets this node hit.
            let child_eligible = if child_data.use_on_fail {
                eligible.to_vec()
            } else {
                hit.clone()
            };
            if child_eligible.is_empty() {
                self.log
                    .push(format!("[SKIP][{}] no hit targets", child_data.name));
                continue;
            }
            self.resolve_node(child, targets, &child_eligible)?;
        }
        Ok(())
    }

    fn spend_cost(&mut self, data: &ActionData) {
        let Some(cost) = &data.cost else { return };
        if cost.value <= 0 {
            return;
        }
        let Some(owner) = self.owner_actor.clone() else {
            return;
        };
        if let Some(actor) = self.world.actor_mut(&owner) {
            let spent = actor.spend(&cost.kind, cost.value);
            let remaining = actor.resources.get(&cost.kind).copied().unwrap_or(0);
            self.log.push(format!(
                "[COST][{}] -{} {} ({} left)",
                data.name, spent, cost.kind, remaining
            ));
        }
    }

    fn roll_common(
        &mut self,
        id: ActionId,
        data: &ActionData,
        targets: &mut TargetMap,
        eligible: &[String],
    ) -> Result<bool, EngineError> {
        let formula_src = effective_formula(&data.formula, "0", data.bonus);
        let terms = formula::parse(&formula_src)?;
        for tid in eligible {
            let Some(record) = targets.get_mut(tid) else {
                continue;
            };
            let eval = formula::evaluate(&terms, self.dice);
            record.stats.insert(
                id,
                ActionStat {
                    action_name: data.name.clone(),
                    hit: true,
                    defence_value: None,
                    attack_total: Some(eval.total),
                    damage: None,
                    roll_mode: None,
                },
            );
            self.log.push(format!(
                "[CHECK][{}] {} = {} for {}",
                data.name, formula_src, eval.total, record.target.actor
            ));
        }
        Ok(true)
    }

    fn roll_attack(
        &mut self,
        id: ActionId,
        data: &ActionData,
        targets: &mut TargetMap,
        eligible: &[String],
    ) -> Result<bool, EngineError> {
        let base = effective_formula(&data.formula, "1d20", data.bonus);
        let mut roll = CheckRoll::new(&base, CheckOptions::default())?;
        let Some(cfg) = self.prompter.configure_check(data, &roll) else {
            self.log
                .push(format!("[CANCEL][{}] check configuration dismissed", data.name));
            return Ok(false);
        };
        roll.apply_configuration(&cfg)?;
        let roll_mode = roll.options().roll_mode;

        // One roll identity for the whole node; per-target totals only
        // when multi-roll was requested.
        let mut shared: Option<CheckOutcome> = None;
        for tid in eligible {
            let Some(record) = targets.get_mut(tid) else {
                continue;
            };
            let outcome = match shared.clone() {
                Some(outcome) if !cfg.multi_roll => outcome,
                _ => {
                    let outcome = roll.reroll(self.dice).clone();
                    shared = Some(outcome.clone());
                    outcome
                }
            };
            let defence_value = self
                .world
                .actor(&record.target.actor)
                .map(|a| a.defence(&data.defence))
                .unwrap_or(0);
            let hit = outcome.total >= defence_value;
            record.stats.insert(
                id,
                ActionStat {
                    action_name: data.name.clone(),
                    hit,
                    defence_value: Some(defence_value),
                    attack_total: Some(outcome.total),
                    damage: None,
                    roll_mode: Some(roll_mode),
                },
            );
            self.log.push(format!(
                "[ATTACK][{}] {} vs {} {} of {} → {}",
                data.name,
                outcome.total,
                data.defence,
                defence_value,
                record.target.actor,
                if hit { "HIT" } else { "MISS" }
            ));
        }
        Ok(true)
    }

    fn roll_damage(
        &mut self,
        id: ActionId,
        data: &ActionData,
        targets: &mut TargetMap,
        eligible: &[String],
    ) -> Result<bool, EngineError> {
        let components = if data.damage.is_empty() && !data.formula.trim().is_empty() {
            vec![DamageComponent {
                formula: data.formula.clone(),
                types: Vec::new(),
            }]
        } else {
            data.damage.clone()
        };
        let (formula_src, types) = DamageComponent::combine(&components, data.bonus)?;
        let mut roll = DamageRoll::new(
            &formula_src,
            DamageOptions {
                types,
                ..DamageOptions::default()
            },
        )?;
        let Some(cfg) = self.prompter.configure_damage(data, &roll) else {
            self.log
                .push(format!("[CANCEL][{}] damage configuration dismissed", data.name));
            return Ok(false);
        };
        roll.apply_configuration(&cfg);
        let roll_mode = roll.options().roll_mode;

        for tid in eligible {
            let Some(record) = targets.get_mut(tid) else {
                continue;
            };
            let outcome = roll.evaluate(self.dice).clone();
            let actor_ref = record.target.actor.clone();
            let net = match self.world.actor_mut(&actor_ref) {
                Some(actor) => {
                    let log = &mut self.log;
                    apply_damage(
                        &actor_ref,
                        actor,
                        &outcome.components,
                        self.options.authority,
                        self.updates,
                        |line| log.push(line),
                    )
                    .net
                }
                None => {
                    // No snapshot to resist with; the raw total stands.
                    self.log.push(format!(
                        "[DMG][{}] no snapshot, {} unresisted",
                        actor_ref, outcome.total
                    ));
                    outcome.total
                }
            };
            record.stats.insert(
                id,
                ActionStat {
                    action_name: data.name.clone(),
                    hit: net > 0,
                    defence_value: None,
                    attack_total: None,
                    damage: Some(net),
                    roll_mode: Some(roll_mode),
                },
            );
        }
        Ok(true)
    }
}

fn effective_formula(formula: &str, fallback: &str, bonus: i32) -> String {
    let base = formula.trim();
    let base = if base.is_empty() { fallback } else { base };
    match bonus {
        0 => base.to_string(),
        b if b > 0 => format!("{} + {}", base, b),
        b => format!("{} - {}", base, -b),
    }
}
