use std::collections::HashSet;

use crate::dto::snapshot::GameView;

/// Cross-participant progress: population, per-level membership sets and the
/// current level number.
#[derive(Debug, Default, Clone)]
pub struct SessionState {
    participant_count: usize,
    ready: HashSet<String>,
    finished: HashSet<String>,
    level: u32,
}

impl SessionState {
    /// Fresh session at level 0 with nobody connected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of participants in the `connected` lifecycle state.
    pub fn participant_count(&self) -> usize {
        self.participant_count
    }

    /// Current level number.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Size of the ready-to-start set.
    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    /// Size of the finished set.
    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// Whether `id` signalled readiness for the current level.
    pub fn is_ready(&self, id: &str) -> bool {
        self.ready.contains(id)
    }

    /// Whether `id` signalled it finished the current level.
    pub fn has_finished(&self, id: &str) -> bool {
        self.finished.contains(id)
    }

    /// Count a participant that entered `connected`.
    pub fn participant_joined(&mut self) {
        self.participant_count += 1;
    }

    /// Uncount a participant that left, dropping it from both membership sets.
    pub fn participant_left(&mut self, id: &str) {
        self.participant_count = self.participant_count.saturating_sub(1);
        self.ready.remove(id);
        self.finished.remove(id);
    }

    /// Add `id` to the ready set; returns `false` if it was already there.
    pub fn mark_ready(&mut self, id: &str) -> bool {
        self.ready.insert(id.to_string())
    }

    /// Add `id` to the finished set; returns `false` if it was already there.
    pub fn mark_finished(&mut self, id: &str) -> bool {
        self.finished.insert(id.to_string())
    }

    /// Everybody connected is ready: `|ready| == participantCount`.
    pub fn ready_quorum(&self) -> bool {
        !self.ready.is_empty() && self.ready.len() == self.participant_count
    }

    /// Enough participants finished, tolerating one straggler:
    /// `|finished| >= max(1, participantCount - 1)`.
    pub fn finish_quorum(&self) -> bool {
        let threshold = self.participant_count.saturating_sub(1).max(1);
        self.finished.len() >= threshold
    }

    /// Advance to the next level, clearing both membership sets. Returns the new level.
    pub fn roll_over(&mut self) -> u32 {
        self.level += 1;
        self.ready.clear();
        self.finished.clear();
        self.level
    }

    /// Counters as published in `serverstate`.
    pub fn view(&self) -> GameView {
        GameView {
            player_count: self.participant_count,
            num_level: self.level,
            ready_count: self.ready.len(),
            finished_count: self.finished.len(),
        }
    }
}
