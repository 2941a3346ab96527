//! Per-robot penalties and preemption reasons

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::team::{RobotId, TeamColor};

/// Condition currently barring a robot from play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreemptionReason {
    #[serde(rename = "penalized")]
    Penalized,
    #[serde(rename = "game-stopped")]
    GameStopped,
}

/// Referee-side state of one robot
#[derive(Debug, Clone, Default)]
pub struct Robot {
    pub penalty_remaining: Option<f64>,
    pub penalty_reason: Option<String>,
    /// Insertion-ordered, no duplicates
    pub preemption_reasons: Vec<PreemptionReason>,
}

impl Robot {
    fn preempt(&mut self, reason: PreemptionReason) {
        if !self.preemption_reasons.contains(&reason) {
            self.preemption_reasons.push(reason);
        }
    }

    fn release(&mut self, reason: PreemptionReason) {
        self.preemption_reasons.retain(|r| *r != reason);
    }

    fn clear_penalty(&mut self) {
        self.penalty_remaining = None;
        self.penalty_reason = None;
        self.release(PreemptionReason::Penalized);
    }

    pub fn is_preempted(&self) -> bool {
        !self.preemption_reasons.is_empty()
    }
}

/// Tracks every robot the referee has seen and its penalty countdown
#[derive(Debug, Clone)]
pub struct PenaltyBoard {
    robots: BTreeMap<RobotId, Robot>,
    game_stopped: bool,
}

impl PenaltyBoard {
    /// Board with `robots_per_team` robots registered for each color
    pub fn new(robots_per_team: u8) -> Self {
        let mut board = Self {
            robots: BTreeMap::new(),
            game_stopped: true,
        };
        for team in TeamColor::ALL {
            for number in 1..=robots_per_team {
                board.robot_mut(RobotId::new(team, number));
            }
        }
        board
    }

    /// Look up a robot, creating it on first reference
    pub fn robot_mut(&mut self, id: RobotId) -> &mut Robot {
        let game_stopped = self.game_stopped;
        self.robots.entry(id).or_insert_with(|| {
            let mut robot = Robot::default();
            if game_stopped {
                robot.preempt(PreemptionReason::GameStopped);
            }
            robot
        })
    }

    #[cfg(test)]
    pub fn get(&self, id: &RobotId) -> Option<&Robot> {
        self.robots.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RobotId, &Robot)> {
        self.robots.iter()
    }

    /// Add a penalty; stacks onto an active one
    pub fn add_penalty(&mut self, id: RobotId, duration_secs: f64, reason: String) -> f64 {
        let robot = self.robot_mut(id);
        let remaining = robot.penalty_remaining.unwrap_or(0.0) + duration_secs;
        robot.penalty_remaining = Some(remaining);
        robot.penalty_reason = Some(reason);
        robot.preempt(PreemptionReason::Penalized);
        remaining
    }

    /// Clear a penalty immediately. Returns whether one was active.
    pub fn cancel_penalty(&mut self, id: RobotId) -> bool {
        let robot = self.robot_mut(id);
        let was_active = robot.penalty_remaining.is_some();
        robot.clear_penalty();
        was_active
    }

    pub fn clear_all(&mut self) {
        for robot in self.robots.values_mut() {
            robot.clear_penalty();
        }
    }

    /// Count every active penalty down; returns the robots released this tick
    pub fn tick(&mut self, delta_secs: f64) -> Vec<RobotId> {
        let mut released = Vec::new();
        for (id, robot) in self.robots.iter_mut() {
            let Some(remaining) = robot.penalty_remaining else {
                continue;
            };
            let remaining = (remaining - delta_secs).max(0.0);
            if remaining <= 0.0 {
                robot.clear_penalty();
                released.push(*id);
            } else {
                robot.penalty_remaining = Some(remaining);
            }
        }
        released
    }

    /// Mark or unmark every robot as stopped by the game phase
    pub fn set_game_stopped(&mut self, stopped: bool) {
        self.game_stopped = stopped;
        for robot in self.robots.values_mut() {
            if stopped {
                robot.preempt(PreemptionReason::GameStopped);
            } else {
                robot.release(PreemptionReason::GameStopped);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn green1() -> RobotId {
        RobotId::new(TeamColor::Green, 1)
    }

    #[test]
    fn penalties_stack() {
        let mut board = PenaltyBoard::new(2);
        board.add_penalty(green1(), 5.0, "manual".into());
        board.add_penalty(green1(), 5.0, "manual".into());
        assert_eq!(board.get(&green1()).unwrap().penalty_remaining, Some(10.0));
    }

    #[test]
    fn countdown_clears_penalty_and_reason() {
        let mut board = PenaltyBoard::new(2);
        board.set_game_stopped(false);
        board.add_penalty(green1(), 5.0, "pushing".into());

        for _ in 0..4 {
            assert!(board.tick(1.0).is_empty());
        }
        assert_eq!(board.tick(1.0), vec![green1()]);

        let robot = board.get(&green1()).unwrap();
        assert_eq!(robot.penalty_remaining, None);
        assert_eq!(robot.penalty_reason, None);
        assert!(robot.preemption_reasons.is_empty());
    }

    #[test]
    fn overshooting_tick_clamps_at_zero() {
        let mut board = PenaltyBoard::new(0);
        board.add_penalty(green1(), 0.5, "manual".into());
        assert_eq!(board.tick(3.0), vec![green1()]);
        assert_eq!(board.get(&green1()).unwrap().penalty_remaining, None);
    }

    #[test]
    fn preemption_reasons_keep_insertion_order() {
        let mut board = PenaltyBoard::new(1);
        board.add_penalty(green1(), 5.0, "manual".into());
        assert_eq!(
            board.get(&green1()).unwrap().preemption_reasons,
            vec![PreemptionReason::GameStopped, PreemptionReason::Penalized]
        );

        board.set_game_stopped(false);
        board.set_game_stopped(true);
        assert_eq!(
            board.get(&green1()).unwrap().preemption_reasons,
            vec![PreemptionReason::Penalized, PreemptionReason::GameStopped]
        );

        assert!(board.cancel_penalty(green1()));
        assert!(!board.cancel_penalty(green1()));
        assert_eq!(
            board.get(&green1()).unwrap().preemption_reasons,
            vec![PreemptionReason::GameStopped]
        );
    }

    #[test]
    fn unknown_robots_are_created_lazily() {
        let mut board = PenaltyBoard::new(2);
        let blue7 = RobotId::new(TeamColor::Blue, 7);
        assert!(board.get(&blue7).is_none());
        board.add_penalty(blue7, 5.0, "manual".into());
        assert_eq!(board.iter().count(), 5);
        assert!(board.get(&blue7).unwrap().is_preempted());
    }
}
