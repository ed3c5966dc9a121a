//! Resistance-based damage reduction and health routing.

use serde::{Deserialize, Serialize};

use crate::actor::ActorSnapshot;
use crate::damage::TypedDamage;

/// Per damage-type reduction: a flat value, or total negation when immune.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResistanceEntry {
    #[serde(default)]
    pub value: i32,
    #[serde(default)]
    pub immune: bool,
}

/// Reduce one typed damage component. Immunity negates the whole value;
/// otherwise at most `value` is subtracted, never pushing a single
/// component below 0. Negative components (healing terms) pass through.
pub fn reduce_component(entry: Option<ResistanceEntry>, value: i32) -> i32 {
    if value <= 0 {
        return value;
    }
    match entry {
        Some(e) if e.immune => 0,
        Some(e) => value - e.value.clamp(0, value),
        None => value,
    }
}

/// The single remote-update operation: broadcast on a system-scoped
/// channel, applied only by a privileged receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    pub operation: String,
    pub actor_ref: String,
    pub update: serde_json::Value,
    pub value: i32,
}

impl RemoteUpdate {
    pub fn actor_data(actor_ref: &str, new_health: i32, net_damage: i32) -> Self {
        Self {
            operation: "updateActorData".to_string(),
            actor_ref: actor_ref.to_string(),
            update: serde_json::json!({ "health": new_health }),
            value: net_damage,
        }
    }
}

/// Outbound channel for updates the caller has no authority to apply
/// directly. Fire-and-forget; delivery failures are not observed.
pub trait UpdateSink {
    fn send(&mut self, update: RemoteUpdate);
}

impl UpdateSink for Vec<RemoteUpdate> {
    fn send(&mut self, update: RemoteUpdate) {
        self.push(update);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageApplication {
    pub raw: i32,
    pub net: i32,
    pub health_before: i32,
    pub health_after: i32,
}

/// Apply typed damage to an actor. Each component is reduced independently
/// through the resistance table, the net sum is subtracted from health
/// (floored at 0), and the mutation is routed directly or as a remote
/// update depending on the caller's authority.
pub fn apply_damage(
    actor_ref: &str,
    actor: &mut ActorSnapshot,
    components: &[TypedDamage],
    authority: bool,
    updates: &mut dyn UpdateSink,
    mut log: impl FnMut(String),
) -> DamageApplication {
    let raw: i32 = components.iter().map(|c| c.amount).sum();
    let net: i32 = components
        .iter()
        .map(|c| reduce_component(actor.resistance(&c.damage_type), c.amount))
        .sum();
    let before = actor.health;
    let after = (before - net).max(0);
    if authority {
        actor.health = after;
    } else {
        updates.send(RemoteUpdate::actor_data(actor_ref, after, net));
    }
    log(format!(
        "[DMG][{}] {} → {} (raw {}, net {})",
        actor.name, before, after, raw, net
    ));
    DamageApplication {
        raw,
        net,
        health_before: before,
        health_after: after,
    }
}
