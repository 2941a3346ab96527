//! Immutable match views handed to readers

use serde::Serialize;
use uuid::Uuid;

use super::events::{EventLog, RefereeEvent};
use super::penalty::PreemptionReason;
use super::referee::{Half, HalfTimeStep, Phase, Referee};
use super::team::{RobotId, TeamColor};

/// Read-only copy of the whole match
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub match_id: Uuid,
    pub phase: Phase,
    pub half: Half,
    pub timer_seconds: i64,
    pub x_positive_team: TeamColor,
    pub status_message: String,
    pub half_time: Option<HalfTimeStep>,
    /// Sequence of the goal event awaiting validation
    pub pending_goal: Option<u64>,
    pub teams: Vec<TeamView>,
    pub robots: Vec<RobotView>,
    pub recent_events: Vec<RefereeEvent>,
    pub last_sequence: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub color: TeamColor,
    pub name: String,
    pub score: u32,
    pub allow_control: bool,
    /// Whether a control key is configured (the key itself stays secret)
    pub key_set: bool,
    pub packets_received: u64,
    pub last_message_age: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotView {
    pub id: RobotId,
    pub penalty_remaining: Option<f64>,
    pub penalty_reason: Option<String>,
    pub preemption_reasons: Vec<PreemptionReason>,
}

impl MatchView {
    pub fn capture(referee: &Referee) -> Self {
        let gate = referee.gate();
        let teams = TeamColor::ALL
            .into_iter()
            .map(|color| {
                let control = gate.team(color);
                TeamView {
                    color,
                    name: referee.team_name(color).to_string(),
                    score: referee.scores().get(color),
                    allow_control: control.allow_control,
                    key_set: !control.key.is_empty(),
                    packets_received: control.packets_received,
                    last_message_age: control.last_message_age,
                }
            })
            .collect();

        let robots = referee
            .penalties()
            .iter()
            .map(|(id, robot)| RobotView {
                id: *id,
                penalty_remaining: robot.penalty_remaining,
                penalty_reason: robot.penalty_reason.clone(),
                preemption_reasons: robot.preemption_reasons.clone(),
            })
            .collect();

        let events = referee.events();
        Self {
            match_id: referee.match_id(),
            phase: referee.phase(),
            half: referee.half(),
            timer_seconds: referee.timer_seconds(),
            x_positive_team: referee.x_positive_team(),
            status_message: referee.status_message(),
            half_time: referee.half_time_step(),
            pending_goal: referee.pending_goal().map(|goal| goal.sequence),
            teams,
            robots,
            recent_events: events.recent(referee.settings().history_window).to_vec(),
            last_sequence: events.last().map(|e| e.sequence),
        }
    }

    #[cfg(test)]
    pub fn team(&self, color: TeamColor) -> Option<&TeamView> {
        self.teams.iter().find(|t| t.color == color)
    }

    #[cfg(test)]
    pub fn robot(&self, id: RobotId) -> Option<&RobotView> {
        self.robots.iter().find(|r| r.id == id)
    }
}

/// What the controller publishes after every mutation and tick
#[derive(Debug, Clone)]
pub struct Published {
    pub view: MatchView,
    pub events: EventLog,
}

impl Published {
    pub fn capture(referee: &Referee) -> Self {
        Self {
            view: MatchView::capture(referee),
            events: referee.events().clone(),
        }
    }

    pub fn match_id(&self) -> Uuid {
        self.view.match_id
    }

    /// Events with `sequence > after`, in order
    pub fn events_since(&self, after: Option<u64>) -> &[RefereeEvent] {
        self.events.since(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchSettings;

    #[test]
    fn view_mirrors_referee() {
        let mut referee = Referee::new(MatchSettings::default());
        referee.set_team_name(TeamColor::Green, "Lions");
        referee.set_key(TeamColor::Blue, "abc".into());
        referee.start_game().unwrap();
        referee.increment_score(TeamColor::Green, 2).unwrap();

        let view = MatchView::capture(&referee);
        assert_eq!(view.phase, Phase::Running);
        assert_eq!(view.timer_seconds, 300);
        assert_eq!(view.robots.len(), 4);

        let green = view.team(TeamColor::Green).unwrap();
        assert_eq!(green.name, "Lions");
        assert_eq!(green.score, 2);
        assert!(view.team(TeamColor::Blue).unwrap().key_set);
        assert_eq!(view.last_sequence, Some(0));
    }

    #[test]
    fn recent_window_is_bounded() {
        let mut referee = Referee::new(MatchSettings {
            history_window: 2,
            ..MatchSettings::default()
        });
        referee.start_game().unwrap();
        referee.pause_game().unwrap();
        referee.resume_game().unwrap();

        let published = Published::capture(&referee);
        let window: Vec<u64> = published.view.recent_events.iter().map(|e| e.sequence).collect();
        assert_eq!(window, vec![1, 2]);
        assert_eq!(published.events_since(None).len(), 3);
        assert_eq!(published.events_since(Some(0)).len(), 2);
    }

    #[test]
    fn published_view_is_detached_from_later_mutations() {
        let mut referee = Referee::new(MatchSettings::default());
        referee.start_game().unwrap();
        let published = Published::capture(&referee);

        referee.pause_game().unwrap();
        referee.tick(1.0);

        assert_eq!(published.view.phase, Phase::Running);
        assert_eq!(published.events.len(), 1);
    }

    #[test]
    fn view_serializes_camel_case() {
        let referee = Referee::new(MatchSettings::default());
        let json = serde_json::to_value(MatchView::capture(&referee)).unwrap();
        assert_eq!(json["phase"], "not_started");
        assert_eq!(json["xPositiveTeam"], "green");
        assert_eq!(json["robots"][0]["preemptionReasons"][0], "game-stopped");
        assert!(json["teams"][0].get("key").is_none());
    }
}
