//! Scenario entry point: one self-contained description of a world, an
//! action tree and an invocation, resolved in a single call. This is the
//! surface the CLI and integration tests drive.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::action::resolve::{ResolutionOptions, Resolver, RollPrompter, TargetAcquisition};
use crate::action::{ActionArena, ActionData, ActionTree};
use crate::actor::World;
use crate::check::{CheckConfiguration, CheckRoll};
use crate::damage::{DamageConfiguration, DamageRoll};
use crate::path::{self, OwnerRef};
use crate::resist::RemoteUpdate;
use crate::target::{TargetRef, TargetSummary};
use crate::Dice;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioConfig {
    pub owner: OwnerRef,
    #[serde(default)]
    pub world: World,
    pub actions: Vec<ActionTree>,
    /// UUID path of the node to invoke; the first root when unset.
    #[serde(default)]
    pub invoke: Option<String>,
    #[serde(default)]
    pub targets: Vec<TargetRef>,
    #[serde(default)]
    pub seed: u64,
    /// Predetermined die results; overrides the seed when non-empty.
    #[serde(default)]
    pub rolls: Vec<i32>,
    #[serde(default)]
    pub check: Option<CheckConfiguration>,
    #[serde(default)]
    pub damage: Option<DamageConfiguration>,
    #[serde(default)]
    pub options: ResolutionOptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioResult {
    pub cancelled: bool,
    pub summaries: Vec<TargetSummary>,
    /// Health per actor after resolution.
    pub health: IndexMap<String, i32>,
    pub updates: Vec<RemoteUpdate>,
    pub log: Vec<String>,
}

/// Prompter that answers every dialog from the scenario's canned
/// configurations instead of asking anyone.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompter {
    pub check: Option<CheckConfiguration>,
    pub damage: Option<DamageConfiguration>,
    /// Dismiss every dialog instead of confirming it.
    pub cancel: bool,
}

impl RollPrompter for ScriptedPrompter {
    fn configure_check(&mut self, _: &ActionData, _: &CheckRoll) -> Option<CheckConfiguration> {
        if self.cancel {
            return None;
        }
        Some(self.check.clone().unwrap_or_default())
    }

    fn configure_damage(&mut self, _: &ActionData, _: &DamageRoll) -> Option<DamageConfiguration> {
        if self.cancel {
            return None;
        }
        Some(self.damage.clone().unwrap_or_default())
    }
}

/// Load a scenario from a JSON or YAML file, by extension.
pub fn load_scenario(file: &Path) -> Result<ScenarioConfig> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("failed to read scenario: {}", file.display()))?;
    let by_ext = file.extension().and_then(|e| e.to_str());
    let config = match by_ext {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("failed to parse scenario YAML: {}", file.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("failed to parse scenario JSON: {}", file.display()))?,
    };
    Ok(config)
}

/// Load one of the compiled-in demo scenarios by name.
pub fn builtin_scenario(name: &str) -> Result<ScenarioConfig> {
    let text = crate::content::builtin_scenarios()
        .get(name)
        .copied()
        .with_context(|| format!("no builtin scenario named '{}'", name))?;
    let config = serde_json::from_str(text)
        .with_context(|| format!("failed to parse builtin scenario '{}'", name))?;
    Ok(config)
}

pub fn run_scenario(cfg: ScenarioConfig) -> Result<ScenarioResult> {
    let mut world = cfg.world;
    let arena = ActionArena::from_trees(cfg.owner, cfg.actions);
    let root = match &cfg.invoke {
        Some(uuid) => path::resolve_uuid(&arena, uuid)?,
        None => *arena
            .roots()
            .first()
            .context("scenario declares no actions")?,
    };

    let mut dice = if cfg.rolls.is_empty() {
        Dice::from_seed(cfg.seed)
    } else {
        Dice::from_scripted(cfg.rolls)
    };
    let mut prompter = ScriptedPrompter {
        check: cfg.check,
        damage: cfg.damage,
        cancel: false,
    };
    let mut updates: Vec<RemoteUpdate> = Vec::new();

    let mut resolver = Resolver::new(
        &arena,
        &mut world,
        &mut dice,
        &mut prompter,
        &mut updates,
        cfg.options,
    );
    let summaries = resolver.resolve(root, TargetAcquisition::Explicit(cfg.targets))?;
    let log = std::mem::take(&mut resolver.log);
    drop(resolver);

    let health = world
        .actors
        .iter()
        .map(|(actor_ref, actor)| (actor_ref.clone(), actor.health))
        .collect();
    Ok(ScenarioResult {
        cancelled: summaries.is_none(),
        summaries: summaries.unwrap_or_default(),
        health,
        updates,
        log,
    })
}
