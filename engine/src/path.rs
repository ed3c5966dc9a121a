//! UUID path addressing for action nodes.
//!
//! Inside the engine an action's identity is its arena id; the dot-joined
//! path string (`Actor.hero.Action.1.Action.2`) exists only at this
//! boundary, derived on demand and parsed back by splitting on `.Action.`.

use serde::{Deserialize, Serialize};

use crate::action::{ActionArena, ActionId};
use crate::EngineError;

const ACTION_SEPARATOR: &str = ".Action.";

/// Root ownership of an action tree: an actor or one of its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRef {
    Actor(String),
    Item(String),
}

impl OwnerRef {
    pub fn prefix(&self) -> String {
        match self {
            OwnerRef::Actor(actor_ref) => format!("Actor.{}", actor_ref),
            OwnerRef::Item(item_ref) => format!("Item.{}", item_ref),
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            OwnerRef::Actor(r) | OwnerRef::Item(r) => r,
        }
    }
}

/// Derive the full UUID path for a node. None for a removed node.
pub fn action_uuid(arena: &ActionArena, id: ActionId) -> Option<String> {
    let segments = arena.path_segments(id)?;
    let mut uuid = arena.owner().prefix();
    for segment in segments {
        uuid.push_str(ACTION_SEPARATOR);
        uuid.push_str(segment);
    }
    Some(uuid)
}

/// Walk a UUID path back to an arena id. The owner prefix must match the
/// arena's owner; every `.Action.` segment descends one level.
pub fn resolve_uuid(arena: &ActionArena, uuid: &str) -> Result<ActionId, EngineError> {
    let unknown = || EngineError::UnknownPath(uuid.to_string());
    let (prefix, rest) = uuid.split_once(ACTION_SEPARATOR).ok_or_else(unknown)?;
    if prefix != arena.owner().prefix() {
        return Err(unknown());
    }
    let mut segments = rest.split(ACTION_SEPARATOR);
    let first = segments.next().ok_or_else(unknown)?;
    let mut current = arena
        .roots()
        .iter()
        .copied()
        .find(|&id| arena.get(id).is_some_and(|n| n.segment == first))
        .ok_or_else(unknown)?;
    for segment in segments {
        current = arena
            .children(current)
            .iter()
            .copied()
            .find(|&id| arena.get(id).is_some_and(|n| n.segment == segment))
            .ok_or_else(unknown)?;
    }
    Ok(current)
}
