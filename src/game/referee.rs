//! Match state machine: phases, half-time choreography, goal validation

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchSettings;

use super::clock::Clock;
use super::control::{RobotCommand, TeamControlGate};
use super::events::{EventKind, EventLog, NewEvent};
use super::penalty::{PenaltyBoard, PreemptionReason};
use super::placement::{PlacementOrder, PlacementPattern};
use super::score::ScoreBoard;
use super::team::{PerTeam, RobotId, TeamColor};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Running,
    Paused,
    /// A goal was reported; play is frozen until the referee rules on it
    WaitingGoalValidation,
    HalfTimeBreak,
    Stopped,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NotStarted => "not_started",
            Phase::Running => "running",
            Phase::Paused => "paused",
            Phase::WaitingGoalValidation => "waiting_goal_validation",
            Phase::HalfTimeBreak => "half_time_break",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    First,
    Second,
}

/// Where the half-time choreography currently stands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum HalfTimeStep {
    /// Operator must choose between swapping covers or gently swapping sides
    AwaitingCoverDecision,
    /// Markers are being re-attached; advancing is blocked until the wait elapses
    Identifying { remaining_secs: f64 },
    ReadyForSecondHalf,
}

/// Operator action advancing the half-time choreography
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HalfTimeChoice {
    SwapCovers,
    GentlySwapSide,
    StartSecondHalf,
}

/// Request for an external collaborator, emitted by a command
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Reposition robots (positioning collaborator)
    Place(PlacementOrder),
    /// Stop every robot now (motion collaborator)
    HaltAll,
    /// Forward an authorized control packet (motion collaborator)
    Robot { robot: RobotId, command: RobotCommand },
}

/// Goal awaiting the referee's ruling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingGoal {
    pub sequence: u64,
    pub team: TeamColor,
    resume_to: Phase,
}

/// Referee errors, reported to the caller; none is fatal
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefereeError {
    #[error("{command} is not allowed while the match is {phase}")]
    InvalidTransition { command: &'static str, phase: Phase },

    #[error("Control of team {team} is not authorized")]
    UnauthorizedControl { team: TeamColor },

    #[error("Robot {robot} is preempted: {reasons:?}")]
    Preempted {
        robot: RobotId,
        reasons: Vec<PreemptionReason>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Referee controller is not running")]
    ControllerUnavailable,
}

/// The authoritative referee. Owns every sub-component; all mutation goes through here.
#[derive(Debug, Clone)]
pub struct Referee {
    match_id: Uuid,
    settings: MatchSettings,
    phase: Phase,
    half: Half,
    x_positive_team: TeamColor,
    names: PerTeam<String>,
    clock: Clock,
    scores: ScoreBoard,
    penalties: PenaltyBoard,
    events: EventLog,
    gate: TeamControlGate,
    half_time: Option<HalfTimeStep>,
    pending_goal: Option<PendingGoal>,
    outbox: Vec<Dispatch>,
}

impl Referee {
    pub fn new(settings: MatchSettings) -> Self {
        Self {
            match_id: Uuid::new_v4(),
            phase: Phase::NotStarted,
            half: Half::First,
            x_positive_team: TeamColor::Green,
            names: PerTeam::from_fn(|team| team.default_name().to_string()),
            clock: Clock::new(settings.half_duration_secs),
            scores: ScoreBoard::new(),
            penalties: PenaltyBoard::new(settings.robots_per_team),
            events: EventLog::new(),
            gate: TeamControlGate::new(),
            half_time: None,
            pending_goal: None,
            outbox: Vec::new(),
            settings,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn half(&self) -> Half {
        self.half
    }

    pub fn x_positive_team(&self) -> TeamColor {
        self.x_positive_team
    }

    pub fn team_name(&self, team: TeamColor) -> &str {
        &self.names[team]
    }

    pub fn timer_seconds(&self) -> i64 {
        self.clock.seconds()
    }

    pub fn scores(&self) -> &ScoreBoard {
        &self.scores
    }

    pub fn penalties(&self) -> &PenaltyBoard {
        &self.penalties
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn gate(&self) -> &TeamControlGate {
        &self.gate
    }

    pub fn half_time_step(&self) -> Option<HalfTimeStep> {
        self.half_time
    }

    pub fn pending_goal(&self) -> Option<&PendingGoal> {
        self.pending_goal.as_ref()
    }

    /// Collaborator requests emitted since the last call
    pub fn take_dispatches(&mut self) -> Vec<Dispatch> {
        std::mem::take(&mut self.outbox)
    }

    /// Human-readable game state for scoreboards
    pub fn status_message(&self) -> String {
        match self.phase {
            Phase::NotStarted => "Game not started".to_string(),
            Phase::Running if self.clock.is_overtime() => "Overtime".to_string(),
            Phase::Running => match self.half {
                Half::First => "First half running".to_string(),
                Half::Second => "Second half running".to_string(),
            },
            Phase::Paused => "Game paused".to_string(),
            Phase::WaitingGoalValidation => match self.pending_goal {
                Some(goal) => format!("Goal for {}, waiting for validation", self.names[goal.team]),
                None => "Waiting for goal validation".to_string(),
            },
            Phase::HalfTimeBreak => match self.half_time {
                Some(HalfTimeStep::Identifying { .. }) => "Half time: identifying robots".to_string(),
                Some(HalfTimeStep::ReadyForSecondHalf) => {
                    "Half time: ready for second half".to_string()
                }
                _ => "Half time".to_string(),
            },
            Phase::Stopped => "Game stopped".to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Game flow
    // ------------------------------------------------------------------

    pub fn start_game(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("start_game", &[Phase::NotStarted, Phase::Stopped])?;

        self.clock.reset();
        self.half = Half::First;
        self.half_time = None;
        self.pending_goal = None;
        self.penalties.clear_all();
        self.set_phase(Phase::Running);
        let sequence = self.record(NewEvent::neutral(EventKind::MatchStart));

        info!(match_id = %self.match_id, sequence, "Game started");
        Ok(())
    }

    pub fn pause_game(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("pause_game", &[Phase::Running])?;
        self.set_phase(Phase::Paused);
        self.record(NewEvent::neutral(EventKind::Pause));
        info!(match_id = %self.match_id, timer = self.clock.seconds(), "Game paused");
        Ok(())
    }

    pub fn resume_game(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("resume_game", &[Phase::Paused])?;
        self.set_phase(Phase::Running);
        self.record(NewEvent::neutral(EventKind::Resume));
        info!(match_id = %self.match_id, timer = self.clock.seconds(), "Game resumed");
        Ok(())
    }

    pub fn stop_game(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("stop_game", &[Phase::Running, Phase::Paused])?;
        self.set_phase(Phase::Stopped);
        self.record(NewEvent::neutral(EventKind::Stop));
        info!(match_id = %self.match_id, timer = self.clock.seconds(), "Game stopped");
        Ok(())
    }

    /// A goal was seen; freeze play until `validate_goal`
    pub fn report_goal(&mut self, team: TeamColor) -> Result<(), RefereeError> {
        self.expect_phase("report_goal", &[Phase::Running])?;

        let resume_to = self.phase;
        self.set_phase(Phase::WaitingGoalValidation);
        let sequence = self.record(NewEvent::team(team, EventKind::Goal));
        self.pending_goal = Some(PendingGoal {
            sequence,
            team,
            resume_to,
        });

        info!(match_id = %self.match_id, team = %team, sequence, "Goal reported, waiting for validation");
        Ok(())
    }

    /// Rule on the pending goal. Scores are left to explicit score commands.
    pub fn validate_goal(&mut self, valid: bool) -> Result<(), RefereeError> {
        self.expect_phase("validate_goal", &[Phase::WaitingGoalValidation])?;
        let goal = self.pending_goal.take().ok_or(RefereeError::InvalidTransition {
            command: "validate_goal",
            phase: self.phase,
        })?;

        self.set_phase(goal.resume_to);
        let kind = if valid {
            EventKind::GoalConfirmed
        } else {
            EventKind::GoalDisallowed
        };
        self.record(NewEvent {
            refers_to: Some(goal.sequence),
            ..NewEvent::team(goal.team, kind)
        });

        info!(match_id = %self.match_id, team = %goal.team, valid, "Goal ruled");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Half time
    // ------------------------------------------------------------------

    pub fn start_half_time(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("start_half_time", &[Phase::Running, Phase::Paused])?;
        if self.half != Half::First {
            return Err(self.invalid("start_half_time"));
        }

        self.set_phase(Phase::HalfTimeBreak);
        self.half_time = Some(HalfTimeStep::AwaitingCoverDecision);
        self.record(NewEvent::neutral(EventKind::HalfTime));

        info!(match_id = %self.match_id, "Half time started");
        Ok(())
    }

    pub fn advance_half_time(&mut self, choice: HalfTimeChoice) -> Result<(), RefereeError> {
        self.expect_phase("advance_half_time", &[Phase::HalfTimeBreak])?;

        match (self.half_time, choice) {
            (Some(HalfTimeStep::AwaitingCoverDecision), HalfTimeChoice::SwapCovers) => {
                // Robots gather in the formation of the upcoming half
                let upcoming = self.x_positive_team.other();
                self.dispatch_placement(PlacementPattern::SwapCovers, upcoming);

                let wait = self.settings.identify_wait_secs;
                self.half_time = Some(if wait > 0.0 {
                    HalfTimeStep::Identifying {
                        remaining_secs: wait,
                    }
                } else {
                    HalfTimeStep::ReadyForSecondHalf
                });
                info!(match_id = %self.match_id, wait_secs = wait, "Swapping covers, identifying robots");
            }
            (Some(HalfTimeStep::AwaitingCoverDecision), HalfTimeChoice::GentlySwapSide) => {
                self.dispatch_placement(PlacementPattern::GentlySwapSide, self.x_positive_team);
                self.complete_half_time();
            }
            (Some(HalfTimeStep::ReadyForSecondHalf), HalfTimeChoice::StartSecondHalf) => {
                self.complete_half_time();
            }
            (step, choice) => {
                debug!(?step, ?choice, "Half-time step rejected");
                return Err(self.invalid("advance_half_time"));
            }
        }
        Ok(())
    }

    /// Cancel the choreography (and any identify wait) without swapping sides
    pub fn abort_half_time(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("abort_half_time", &[Phase::HalfTimeBreak])?;
        self.half_time = None;
        self.set_phase(Phase::Paused);
        self.record(NewEvent::neutral(EventKind::HalfTimeAborted));
        info!(match_id = %self.match_id, "Half time aborted");
        Ok(())
    }

    fn complete_half_time(&mut self) {
        self.x_positive_team = self.x_positive_team.other();
        self.half = Half::Second;
        self.half_time = None;
        self.clock.reset();
        self.set_phase(Phase::Paused);
        self.record(NewEvent::neutral(EventKind::SecondHalf));

        info!(
            match_id = %self.match_id,
            x_positive_team = %self.x_positive_team,
            "Second half ready"
        );
    }

    /// Swap field sides outside of half-time
    pub fn swap_sides(&mut self) -> Result<(), RefereeError> {
        self.expect_phase("swap_sides", &[Phase::NotStarted, Phase::Paused])?;
        self.x_positive_team = self.x_positive_team.other();
        info!(match_id = %self.match_id, x_positive_team = %self.x_positive_team, "Sides swapped");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Penalties and score
    // ------------------------------------------------------------------

    pub fn add_penalty(
        &mut self,
        robot: RobotId,
        duration_secs: Option<f64>,
        reason: Option<String>,
    ) -> Result<(), RefereeError> {
        self.expect_not_stopped("add_penalty")?;

        let duration = duration_secs.unwrap_or(self.settings.default_penalty_secs);
        if !duration.is_finite() || duration <= 0.0 {
            return Err(RefereeError::InvalidArgument(format!(
                "penalty duration must be positive, got {duration}"
            )));
        }

        let reason = reason.unwrap_or_else(|| "manually_penalized".to_string());
        let remaining = self.penalties.add_penalty(robot, duration, reason);
        self.record(NewEvent::robot(robot, EventKind::Penalty));

        info!(match_id = %self.match_id, robot = %robot, duration, remaining, "Penalty added");
        Ok(())
    }

    pub fn cancel_penalty(&mut self, robot: RobotId) -> Result<(), RefereeError> {
        self.expect_not_stopped("cancel_penalty")?;
        if self.penalties.cancel_penalty(robot) {
            self.record(NewEvent::robot(robot, EventKind::PenaltyCancelled));
            info!(match_id = %self.match_id, robot = %robot, "Penalty cancelled");
        }
        Ok(())
    }

    pub fn increment_score(&mut self, team: TeamColor, delta: i32) -> Result<(), RefereeError> {
        self.expect_not_stopped("increment_score")?;
        let score = self.scores.increment(team, delta);
        info!(match_id = %self.match_id, team = %team, delta, score, "Score updated");
        Ok(())
    }

    pub fn reset_score(&mut self) -> Result<(), RefereeError> {
        self.expect_not_stopped("reset_score")?;
        self.scores.reset();
        info!(match_id = %self.match_id, "Scores reset");
        Ok(())
    }

    pub fn place_game(&mut self, pattern: PlacementPattern) -> Result<(), RefereeError> {
        self.expect_not_stopped("place_game")?;
        self.dispatch_placement(pattern, self.x_positive_team);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Teams and control
    // ------------------------------------------------------------------

    pub fn set_team_name(&mut self, team: TeamColor, name: &str) {
        let name = name.trim();
        self.names[team] = if name.is_empty() {
            team.default_name().to_string()
        } else {
            name.to_string()
        };
        info!(team = %team, name = %self.names[team], "Team renamed");
    }

    pub fn set_key(&mut self, team: TeamColor, key: String) {
        self.gate.set_key(team, key);
        info!(team = %team, "Team control key updated");
    }

    pub fn allow_control(&mut self, team: TeamColor, allow: bool) {
        self.gate.allow_control(team, allow);
        info!(team = %team, allow, "Team control authorization changed");
    }

    /// Halt every robot and withdraw team control. Phase is untouched.
    pub fn emergency(&mut self) {
        self.outbox.push(Dispatch::HaltAll);
        self.gate.revoke_all();
        self.record(NewEvent::neutral(EventKind::Emergency));
        warn!(match_id = %self.match_id, phase = %self.phase, "Emergency stop");
    }

    /// Authorize a team's control packet and forward it to the robot
    pub fn control_packet(
        &mut self,
        team: TeamColor,
        number: u8,
        key: &str,
        command: RobotCommand,
    ) -> Result<(), RefereeError> {
        if !self.gate.authorize(team, key) {
            debug!(team = %team, number, "Unauthorized control packet dropped");
            return Err(RefereeError::UnauthorizedControl { team });
        }

        let robot = RobotId::new(team, number);
        let state = self.penalties.robot_mut(robot);
        if state.is_preempted() {
            return Err(RefereeError::Preempted {
                robot,
                reasons: state.preemption_reasons.clone(),
            });
        }

        self.outbox.push(Dispatch::Robot { robot, command });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// Advance by `delta_secs` of wall time
    pub fn tick(&mut self, delta_secs: f64) {
        if !delta_secs.is_finite() || delta_secs <= 0.0 {
            return;
        }

        self.gate.tick(delta_secs);

        if let Some(HalfTimeStep::Identifying { remaining_secs }) = self.half_time {
            let remaining_secs = remaining_secs - delta_secs;
            self.half_time = Some(if remaining_secs <= 0.0 {
                info!(match_id = %self.match_id, "Identification wait elapsed");
                HalfTimeStep::ReadyForSecondHalf
            } else {
                HalfTimeStep::Identifying { remaining_secs }
            });
        }

        if self.phase == Phase::Running {
            self.clock.tick(delta_secs);
            for robot in self.penalties.tick(delta_secs) {
                info!(match_id = %self.match_id, robot = %robot, "Penalty served");
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
        self.clock.set_running(phase == Phase::Running);
        self.penalties.set_game_stopped(phase != Phase::Running);
    }

    fn record(&mut self, event: NewEvent) -> u64 {
        let match_time = self.clock.seconds();
        self.events.append(event, match_time).sequence
    }

    fn dispatch_placement(&mut self, pattern: PlacementPattern, x_positive_team: TeamColor) {
        info!(match_id = %self.match_id, ?pattern, x_positive_team = %x_positive_team, "Placement requested");
        self.outbox
            .push(Dispatch::Place(PlacementOrder::resolve(pattern, x_positive_team)));
    }

    fn invalid(&self, command: &'static str) -> RefereeError {
        RefereeError::InvalidTransition {
            command,
            phase: self.phase,
        }
    }

    fn expect_phase(&self, command: &'static str, allowed: &[Phase]) -> Result<(), RefereeError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            warn!(command, phase = %self.phase, "Rejected command");
            Err(self.invalid(command))
        }
    }

    fn expect_not_stopped(&self, command: &'static str) -> Result<(), RefereeError> {
        if self.phase == Phase::Stopped {
            warn!(command, "Rejected command, game is stopped");
            Err(self.invalid(command))
        } else {
            Ok(())
        }
    }
}
