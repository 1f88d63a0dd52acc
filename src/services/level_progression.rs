//! Barrier logic that lets the connected group advance through levels together.
//!
//! Everything here is a pure function of [`SessionState`]: callers get back the
//! game events to broadcast and are responsible for sending them.

use serde_json::{Value, json};

use crate::{
    dto::ws::{GameEventPayload, Position},
    error::SessionError,
    state::session::SessionState,
};

const EVENT_ENTER_STATE: &str = "enterState";
const EVENT_MOUSE_MOVE: &str = "mouseMove";
const EVENT_LOAD_NEXT_LEVEL: &str = "loadNextLevel";

const STATE_WARMUP: &str = "warmup";
const STATE_LEVEL: &str = "level";
const STATE_RETRY: &str = "retry";
const STATE_FINISH: &str = "finish";

/// Per-participant progress signals carried by `enterState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSignal {
    /// Ready to start the current level.
    Warmup,
    /// Re-request of the "enter level" event.
    EnterLevel,
    /// Ask the group to restart the level.
    Retry,
    /// Done with the current level.
    Finish,
}

/// Interpretation of an inbound `game event`.
#[derive(Debug, Clone, PartialEq)]
pub enum GameSignal {
    /// Level-progression signal.
    Level(LevelSignal),
    /// Position update.
    Movement(Position),
    /// Anything else, relayed verbatim.
    Relay(GameEventPayload),
}

impl GameSignal {
    /// Classify a raw game event.
    pub fn classify(payload: GameEventPayload) -> Result<Self, SessionError> {
        match payload.event_name.as_str() {
            EVENT_ENTER_STATE => {
                let signal = match payload.first_arg_str() {
                    Some(STATE_WARMUP) => LevelSignal::Warmup,
                    Some(STATE_LEVEL) => LevelSignal::EnterLevel,
                    Some(STATE_RETRY) => LevelSignal::Retry,
                    Some(STATE_FINISH) => LevelSignal::Finish,
                    _ => return Ok(Self::Relay(payload)),
                };
                Ok(Self::Level(signal))
            }
            EVENT_MOUSE_MOVE => {
                let coordinate = |index: usize| payload.args.get(index).and_then(Value::as_f64);
                match (coordinate(0), coordinate(1)) {
                    (Some(x), Some(y)) => Ok(Self::Movement(Position { x, y })),
                    _ => Err(SessionError::MalformedEvent(format!(
                        "{EVENT_MOUSE_MOVE} expects two numeric args, got {:?}",
                        payload.args
                    ))),
                }
            }
            _ => Ok(Self::Relay(payload)),
        }
    }
}

/// Quorum flags captured before a departure so only fresh transitions fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumStatus {
    ready: bool,
    finished: bool,
}

impl QuorumStatus {
    /// Capture the current quorum flags.
    pub fn capture(session: &SessionState) -> Self {
        Self {
            ready: session.ready_quorum(),
            finished: session.finish_quorum(),
        }
    }
}

/// `enterState: ['level']`
pub fn enter_level_event(origin: Option<String>) -> GameEventPayload {
    GameEventPayload::new(EVENT_ENTER_STATE, vec![json!(STATE_LEVEL)], origin)
}

/// `enterState: ['retry']`
pub fn retry_event(origin: Option<String>) -> GameEventPayload {
    GameEventPayload::new(EVENT_ENTER_STATE, vec![json!(STATE_RETRY)], origin)
}

/// `loadNextLevel: {numLevel}`
pub fn load_next_level_event(level: u32, origin: Option<String>) -> GameEventPayload {
    GameEventPayload::new(
        EVENT_LOAD_NEXT_LEVEL,
        vec![json!({ "numLevel": level })],
        origin,
    )
}

/// Apply one participant's signal, returning the event to broadcast, if any.
///
/// `origin` must be a connected participant; the caller checks registration.
pub fn apply(
    session: &mut SessionState,
    origin: &str,
    signal: LevelSignal,
) -> Option<GameEventPayload> {
    let tag = Some(origin.to_string());
    match signal {
        LevelSignal::Warmup => {
            let inserted = session.mark_ready(origin);
            (inserted && session.ready_quorum()).then(|| enter_level_event(tag))
        }
        LevelSignal::EnterLevel => session.ready_quorum().then(|| enter_level_event(tag)),
        LevelSignal::Retry => Some(retry_event(tag)),
        LevelSignal::Finish => {
            let inserted = session.mark_finished(origin);
            if inserted && session.finish_quorum() {
                let level = session.roll_over();
                Some(load_next_level_event(level, tag))
            } else {
                None
            }
        }
    }
}

/// Re-evaluate both barriers after a participant left.
///
/// The departure may have made the remaining group quorate without anybody
/// re-signalling; those events carry no `playerId`. The finish barrier is
/// checked first: a rollover clears the ready set, so entering the old level
/// is never announced alongside it.
pub fn after_departure(session: &mut SessionState, before: QuorumStatus) -> Vec<GameEventPayload> {
    if !before.finished && session.finish_quorum() {
        let level = session.roll_over();
        return vec![load_next_level_event(level, None)];
    }

    if !before.ready && session.ready_quorum() {
        return vec![enter_level_event(None)];
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(count: usize) -> SessionState {
        let mut session = SessionState::new();
        for _ in 0..count {
            session.participant_joined();
        }
        session
    }

    fn enter_state(arg: &str) -> GameEventPayload {
        GameEventPayload::new(EVENT_ENTER_STATE, vec![json!(arg)], None)
    }

    #[test]
    fn classify_enter_state_variants() {
        assert_eq!(
            GameSignal::classify(enter_state("warmup")).unwrap(),
            GameSignal::Level(LevelSignal::Warmup)
        );
        assert_eq!(
            GameSignal::classify(enter_state("level")).unwrap(),
            GameSignal::Level(LevelSignal::EnterLevel)
        );
        assert_eq!(
            GameSignal::classify(enter_state("retry")).unwrap(),
            GameSignal::Level(LevelSignal::Retry)
        );
        assert_eq!(
            GameSignal::classify(enter_state("finish")).unwrap(),
            GameSignal::Level(LevelSignal::Finish)
        );
    }

    #[test]
    fn classify_unknown_enter_state_relays() {
        let payload = enter_state("lobby");
        assert_eq!(
            GameSignal::classify(payload.clone()).unwrap(),
            GameSignal::Relay(payload)
        );
    }

    #[test]
    fn classify_mouse_move() {
        let payload = GameEventPayload::new(EVENT_MOUSE_MOVE, vec![json!(4), json!(2.5)], None);
        assert_eq!(
            GameSignal::classify(payload).unwrap(),
            GameSignal::Movement(Position { x: 4.0, y: 2.5 })
        );

        let bad = GameEventPayload::new(EVENT_MOUSE_MOVE, vec![json!("left")], None);
        assert!(matches!(
            GameSignal::classify(bad),
            Err(SessionError::MalformedEvent(_))
        ));
    }

    #[test]
    fn classify_other_names_relay() {
        let payload = GameEventPayload::new("chat", vec![json!("hi")], None);
        assert!(matches!(
            GameSignal::classify(payload).unwrap(),
            GameSignal::Relay(_)
        ));
    }

    #[test]
    fn warmup_fires_once_on_last_signal() {
        let mut session = session_with(3);
        assert_eq!(apply(&mut session, "a", LevelSignal::Warmup), None);
        assert_eq!(apply(&mut session, "b", LevelSignal::Warmup), None);

        let event = apply(&mut session, "c", LevelSignal::Warmup).unwrap();
        assert_eq!(event, enter_level_event(Some("c".into())));

        // duplicate readiness after quorum does not re-broadcast
        assert_eq!(apply(&mut session, "c", LevelSignal::Warmup), None);
        assert_eq!(session.ready_count(), 3);
    }

    #[test]
    fn duplicate_warmup_never_reaches_quorum() {
        let mut session = session_with(2);
        assert_eq!(apply(&mut session, "a", LevelSignal::Warmup), None);
        assert_eq!(apply(&mut session, "a", LevelSignal::Warmup), None);
        assert_eq!(session.ready_count(), 1);
    }

    #[test]
    fn enter_level_ack_only_after_quorum() {
        let mut session = session_with(2);
        apply(&mut session, "a", LevelSignal::Warmup);
        assert_eq!(apply(&mut session, "a", LevelSignal::EnterLevel), None);

        apply(&mut session, "b", LevelSignal::Warmup);
        assert_eq!(
            apply(&mut session, "a", LevelSignal::EnterLevel),
            Some(enter_level_event(Some("a".into())))
        );
        assert_eq!(session.ready_count(), 2);
    }

    #[test]
    fn retry_passes_through_without_touching_sets() {
        let mut session = session_with(3);
        apply(&mut session, "a", LevelSignal::Warmup);
        apply(&mut session, "a", LevelSignal::Finish);

        let event = apply(&mut session, "b", LevelSignal::Retry).unwrap();
        assert_eq!(event, retry_event(Some("b".into())));
        assert_eq!(session.ready_count(), 1);
        assert_eq!(session.finished_count(), 1);
    }

    #[test]
    fn finish_rolls_over_with_one_straggler() {
        let mut session = session_with(3);
        apply(&mut session, "a", LevelSignal::Warmup);
        assert_eq!(apply(&mut session, "a", LevelSignal::Finish), None);

        let event = apply(&mut session, "b", LevelSignal::Finish).unwrap();
        assert_eq!(event, load_next_level_event(1, Some("b".into())));
        assert_eq!(event.args[0]["numLevel"], 1);
        assert_eq!(session.level(), 1);
        assert_eq!(session.ready_count(), 0);
        assert_eq!(session.finished_count(), 0);
    }

    #[test]
    fn solo_finish_rolls_over() {
        let mut session = session_with(1);
        let event = apply(&mut session, "solo", LevelSignal::Finish).unwrap();
        assert_eq!(event.event_name, EVENT_LOAD_NEXT_LEVEL);
        assert_eq!(session.level(), 1);
    }

    #[test]
    fn departure_of_unready_player_completes_warmup() {
        let mut session = session_with(3);
        apply(&mut session, "a", LevelSignal::Warmup);
        apply(&mut session, "b", LevelSignal::Warmup);

        let before = QuorumStatus::capture(&session);
        session.participant_left("c");
        let events = after_departure(&mut session, before);

        assert_eq!(events, vec![enter_level_event(None)]);
    }

    #[test]
    fn departure_of_ready_player_keeps_consistent_counts() {
        let mut session = session_with(3);
        apply(&mut session, "a", LevelSignal::Warmup);

        let before = QuorumStatus::capture(&session);
        session.participant_left("a");
        let events = after_departure(&mut session, before);

        assert!(events.is_empty());
        assert_eq!(session.ready_count(), 0);
        assert_eq!(session.participant_count(), 2);
    }

    #[test]
    fn departure_can_trigger_rollover() {
        let mut session = session_with(4);
        apply(&mut session, "a", LevelSignal::Finish);
        apply(&mut session, "b", LevelSignal::Finish);

        let before = QuorumStatus::capture(&session);
        session.participant_left("d");
        let events = after_departure(&mut session, before);

        assert_eq!(events, vec![load_next_level_event(1, None)]);
        assert_eq!(session.finished_count(), 0);
    }

    #[test]
    fn departure_completing_both_barriers_only_rolls_over() {
        let mut session = session_with(4);
        for id in ["a", "b", "c"] {
            apply(&mut session, id, LevelSignal::Warmup);
        }
        apply(&mut session, "a", LevelSignal::Finish);
        apply(&mut session, "b", LevelSignal::Finish);

        let before = QuorumStatus::capture(&session);
        session.participant_left("d");
        let events = after_departure(&mut session, before);

        assert_eq!(events, vec![load_next_level_event(1, None)]);
        assert_eq!(session.ready_count(), 0);
        assert_eq!(session.level(), 1);
    }

    #[test]
    fn departure_after_quorum_does_not_refire() {
        let mut session = session_with(2);
        apply(&mut session, "a", LevelSignal::Warmup);
        apply(&mut session, "b", LevelSignal::Warmup);

        let before = QuorumStatus::capture(&session);
        session.participant_left("b");
        assert!(after_departure(&mut session, before).is_empty());
    }

    #[test]
    fn last_departure_fires_nothing() {
        let mut session = session_with(1);
        let before = QuorumStatus::capture(&session);
        session.participant_left("solo");
        assert!(after_departure(&mut session, before).is_empty());
        assert_eq!(session.level(), 0);
    }
}
