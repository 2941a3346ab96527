//! Append-only referee history

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::team::{RobotId, TeamColor};

/// Which side an event is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTeam {
    Green,
    Blue,
    Neutral,
}

impl From<TeamColor> for EventTeam {
    fn from(team: TeamColor) -> Self {
        match team {
            TeamColor::Green => EventTeam::Green,
            TeamColor::Blue => EventTeam::Blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    MatchStart,
    Pause,
    Resume,
    Stop,
    Goal,
    GoalConfirmed,
    GoalDisallowed,
    Penalty,
    PenaltyCancelled,
    HalfTime,
    HalfTimeAborted,
    SecondHalf,
    Emergency,
}

/// One immutable history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeEvent {
    pub sequence: u64,
    pub match_time_seconds: i64,
    pub team: EventTeam,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robot: Option<RobotId>,
    /// Sequence of the event this one resolves (goal validation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refers_to: Option<u64>,
    pub recorded_at: DateTime<Utc>,
}

/// Fields of an event that the caller chooses
#[derive(Debug, Clone, Copy)]
pub struct NewEvent {
    pub team: EventTeam,
    pub kind: EventKind,
    pub robot: Option<RobotId>,
    pub refers_to: Option<u64>,
}

impl NewEvent {
    pub fn neutral(kind: EventKind) -> Self {
        Self {
            team: EventTeam::Neutral,
            kind,
            robot: None,
            refers_to: None,
        }
    }

    pub fn team(team: TeamColor, kind: EventKind) -> Self {
        Self {
            team: team.into(),
            ..Self::neutral(kind)
        }
    }

    pub fn robot(robot: RobotId, kind: EventKind) -> Self {
        Self {
            robot: Some(robot),
            ..Self::team(robot.team, kind)
        }
    }
}

/// Gapless, sequence-numbered log. Entries live behind an `Arc` so published
/// copies are shared; appends copy-on-write only while a reader still holds one.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Arc<Vec<RefereeEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: NewEvent, match_time_seconds: i64) -> &RefereeEvent {
        let entries = Arc::make_mut(&mut self.entries);
        let sequence = entries.len() as u64;
        entries.push(RefereeEvent {
            sequence,
            match_time_seconds,
            team: event.team,
            kind: event.kind,
            robot: event.robot,
            refers_to: event.refers_to,
            recorded_at: Utc::now(),
        });
        &entries[entries.len() - 1]
    }

    /// Entries with `sequence > after` (everything when `after` is `None`).
    /// Sequences start at 0 without gaps, so this is a plain range.
    pub fn since(&self, after: Option<u64>) -> &[RefereeEvent] {
        let start = match after {
            None => 0,
            Some(seq) => usize::try_from(seq.saturating_add(1)).unwrap_or(usize::MAX),
        };
        self.entries.get(start..).unwrap_or(&[])
    }

    /// The last `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[RefereeEvent] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn last(&self) -> Option<&RefereeEvent> {
        self.entries.last()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with(n: usize) -> EventLog {
        let mut log = EventLog::new();
        for i in 0..n {
            log.append(NewEvent::neutral(EventKind::Pause), 300 - i as i64);
        }
        log
    }

    #[test]
    fn sequences_are_gapless_from_zero() {
        let log = log_with(4);
        let seqs: Vec<u64> = log.since(None).iter().map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[test]
    fn since_is_exclusive_and_idempotent() {
        let log = log_with(5);
        let first: Vec<u64> = log.since(Some(2)).iter().map(|e| e.sequence).collect();
        let second: Vec<u64> = log.since(Some(2)).iter().map(|e| e.sequence).collect();
        assert_eq!(first, vec![3, 4]);
        assert_eq!(first, second);
        assert!(log.since(Some(4)).is_empty());
        assert!(log.since(Some(u64::MAX)).is_empty());
    }

    #[test]
    fn since_can_be_walked_twice() {
        let log = log_with(3);
        let tail = log.since(Some(0));
        assert_eq!(tail.iter().count(), 2);
        assert_eq!(tail.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn append_does_not_disturb_shared_copies() {
        let mut log = log_with(2);
        let published = log.clone();
        log.append(NewEvent::team(TeamColor::Blue, EventKind::Goal), 120);
        assert_eq!(published.len(), 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().team, EventTeam::Blue);
    }

    #[test]
    fn recent_returns_tail_window() {
        let log = log_with(5);
        let window: Vec<u64> = log.recent(3).iter().map(|e| e.sequence).collect();
        assert_eq!(window, vec![2, 3, 4]);
        assert_eq!(log.recent(10).len(), 5);
    }

    #[test]
    fn event_serializes_with_camel_case_fields() {
        let mut log = EventLog::new();
        let robot = RobotId::new(TeamColor::Green, 2);
        let event = log.append(NewEvent::robot(robot, EventKind::Penalty), 42).clone();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["matchTimeSeconds"], 42);
        assert_eq!(json["kind"], "Penalty");
        assert_eq!(json["team"], "green");
        assert_eq!(json["robot"], "green2");
        assert!(json.get("refersTo").is_none());
    }
}
