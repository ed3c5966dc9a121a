//! Actor and item data snapshots.
//!
//! The engine does not own a document store; it consumes snapshots handed
//! over by the host application (deserialized from scenario files here).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::damage::DamageType;
use crate::path::OwnerRef;
use crate::resist::ResistanceEntry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResistanceRow {
    pub damage_type: DamageType,
    #[serde(default)]
    pub value: i32,
    #[serde(default)]
    pub immune: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSnapshot {
    pub name: String,
    pub health: i32,
    pub max_health: i32,
    /// Defence values keyed by defence name ("reflex", "will", ...).
    #[serde(default)]
    pub defences: IndexMap<String, i32>,
    /// Spendable resource pools keyed by resource kind.
    #[serde(default)]
    pub resources: IndexMap<String, i32>,
    #[serde(default)]
    pub resistances: Vec<ResistanceRow>,
}

impl ActorSnapshot {
    /// Missing defence entries count as 0, so an attack against an unknown
    /// defence always meets its threshold.
    pub fn defence(&self, key: &str) -> i32 {
        self.defences.get(key).copied().unwrap_or(0)
    }

    /// Missing entries mean the damage is fully unresisted.
    pub fn resistance(&self, damage_type: &DamageType) -> Option<ResistanceEntry> {
        self.resistances
            .iter()
            .find(|row| &row.damage_type == damage_type)
            .map(|row| ResistanceEntry {
                value: row.value,
                immune: row.immune,
            })
    }

    /// Deduct a resource cost, flooring the pool at 0. Returns the amount
    /// actually spent.
    pub fn spend(&mut self, kind: &str, value: i32) -> i32 {
        let pool = self.resources.entry(kind.to_string()).or_insert(0);
        let spent = value.min(*pool).max(0);
        *pool -= spent;
        spent
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub name: String,
    /// Reference to the actor carrying this item, if any.
    #[serde(default)]
    pub actor: Option<String>,
}

/// Lookup table of every actor and item snapshot visible to a resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct World {
    #[serde(default)]
    pub actors: IndexMap<String, ActorSnapshot>,
    #[serde(default)]
    pub items: IndexMap<String, ItemSnapshot>,
}

impl World {
    pub fn actor(&self, actor_ref: &str) -> Option<&ActorSnapshot> {
        self.actors.get(actor_ref)
    }

    pub fn actor_mut(&mut self, actor_ref: &str) -> Option<&mut ActorSnapshot> {
        self.actors.get_mut(actor_ref)
    }

    /// Resolve an owner reference to the acting actor's reference. Items
    /// resolve through their carrying actor.
    pub fn resolve_owner(&self, owner: &OwnerRef) -> Option<String> {
        match owner {
            OwnerRef::Actor(actor_ref) => self
                .actors
                .contains_key(actor_ref)
                .then(|| actor_ref.clone()),
            OwnerRef::Item(item_ref) => self
                .items
                .get(item_ref)
                .and_then(|item| item.actor.clone())
                .filter(|actor_ref| self.actors.contains_key(actor_ref)),
        }
    }
}
