use indexmap::IndexMap;

use crate::{
    dto::{snapshot::ParticipantView, ws::Position},
    state::lifecycle::{InvalidTransition, Lifecycle},
};

/// One participant per active connection.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Opaque connection identity.
    pub id: String,
    /// Last reported position, origin by default.
    pub position: Position,
    lifecycle: Lifecycle,
}

impl Participant {
    /// Create a participant and run its lifecycle `startup`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidTransition> {
        Ok(Self {
            id: id.into(),
            position: Position::default(),
            lifecycle: Lifecycle::startup()?,
        })
    }

    /// Borrow the lifecycle.
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Mutably borrow the lifecycle to fire transitions.
    pub fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    /// Wire representation `{id, x, y}`.
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id.clone(),
            x: self.position.x,
            y: self.position.y,
        }
    }
}

/// Participants keyed by connection id, in join order.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: IndexMap<String, Participant>,
}

impl ParticipantRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.participants.contains_key(id)
    }

    /// Insert a participant; returns `false` and leaves the registry untouched
    /// when the id is already taken.
    pub fn insert(&mut self, participant: Participant) -> bool {
        if self.participants.contains_key(&participant.id) {
            return false;
        }
        self.participants
            .insert(participant.id.clone(), participant);
        true
    }

    /// Look up a participant.
    pub fn get(&self, id: &str) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Look up a participant for mutation.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Participant> {
        self.participants.get_mut(id)
    }

    /// Remove a participant, keeping the join order of the others.
    pub fn remove(&mut self, id: &str) -> Option<Participant> {
        self.participants.shift_remove(id)
    }

    /// Serialized views of every participant, in join order.
    pub fn views(&self) -> Vec<ParticipantView> {
        self.participants.values().map(Participant::view).collect()
    }

    /// Iterate over participants.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    /// Number of registered participants (any lifecycle state).
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true when nobody is registered.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lifecycle::ConnectionState;

    #[test]
    fn new_participant_sits_at_origin_connecting() {
        let participant = Participant::new("p1").unwrap();
        assert_eq!(participant.position, Position { x: 0.0, y: 0.0 });
        assert_eq!(participant.lifecycle().state(), ConnectionState::Connecting);
    }

    #[test]
    fn duplicate_insert_is_refused() {
        let mut registry = ParticipantRegistry::new();
        assert!(registry.insert(Participant::new("p1").unwrap()));

        let mut moved = Participant::new("p1").unwrap();
        moved.position = Position { x: 5.0, y: 5.0 };
        assert!(!registry.insert(moved));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("p1").unwrap().position.x, 0.0);
    }

    #[test]
    fn views_follow_join_order_after_removal() {
        let mut registry = ParticipantRegistry::new();
        for id in ["c", "a", "b"] {
            registry.insert(Participant::new(id).unwrap());
        }
        registry.remove("a");

        let ids: Vec<_> = registry.views().into_iter().map(|view| view.id).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut registry = ParticipantRegistry::new();
        assert!(registry.remove("ghost").is_none());
        assert!(registry.is_empty());
    }
}
