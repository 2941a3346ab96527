//! Referee controller: single mutation task plus the handle callers use

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use crate::config::MatchSettings;
use crate::util::time::tick_interval;
use crate::ws::protocol::ServerMsg;

use super::control::RobotCommand;
use super::placement::PlacementPattern;
use super::referee::{HalfTimeChoice, Referee, RefereeError};
use super::snapshot::{MatchView, Published};
use super::team::{RobotId, TeamColor};

/// Every mutation the controller accepts
#[derive(Debug, Clone)]
pub enum Command {
    StartGame,
    PauseGame,
    ResumeGame,
    StopGame,
    ResetMatch,
    SwapSides,
    AddPenalty {
        robot: RobotId,
        seconds: Option<f64>,
        reason: Option<String>,
    },
    CancelPenalty {
        robot: RobotId,
    },
    IncrementScore {
        team: TeamColor,
        delta: i32,
    },
    ResetScore,
    ReportGoal {
        team: TeamColor,
    },
    ValidateGoal {
        valid: bool,
    },
    StartHalfTime,
    AdvanceHalfTime {
        choice: HalfTimeChoice,
    },
    AbortHalfTime,
    SetTeamName {
        team: TeamColor,
        name: String,
    },
    SetKey {
        team: TeamColor,
        key: String,
    },
    AllowControl {
        team: TeamColor,
        allow: bool,
    },
    PlaceGame {
        pattern: PlacementPattern,
    },
    Emergency,
    ControlPacket {
        team: TeamColor,
        number: u8,
        key: String,
        command: RobotCommand,
    },
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Result<(), RefereeError>>,
}

/// Owns the match. Commands and ticks are applied one at a time.
pub struct RefereeController {
    referee: Referee,
    settings: MatchSettings,
    command_rx: mpsc::Receiver<Envelope>,
    state_tx: watch::Sender<Arc<Published>>,
    dispatch_tx: broadcast::Sender<ServerMsg>,
}

impl RefereeController {
    pub fn new(settings: MatchSettings) -> (Self, RefereeHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (dispatch_tx, _) = broadcast::channel(64);

        let referee = Referee::new(settings.clone());
        let (state_tx, state_rx) = watch::channel(Arc::new(Published::capture(&referee)));

        let handle = RefereeHandle {
            command_tx,
            state_rx,
            dispatch_tx: dispatch_tx.clone(),
        };

        let controller = Self {
            referee,
            settings,
            command_rx,
            state_tx,
            dispatch_tx,
        };

        (controller, handle)
    }

    /// Start the controller on the current runtime
    pub fn spawn(settings: MatchSettings) -> RefereeHandle {
        let (controller, handle) = Self::new(settings);
        tokio::spawn(controller.run());
        handle
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(match_id = %self.referee.match_id(), "Referee controller started");

        let mut ticker = interval(tick_interval(self.settings.tick_hz));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Delta from real elapsed time absorbs scheduler jitter
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;

                    self.referee.tick(delta);
                    self.publish();
                }
                envelope = self.command_rx.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        break;
                    };

                    let result = self.apply(command);
                    self.publish();
                    let _ = reply.send(result);
                }
            }
        }

        info!(match_id = %self.referee.match_id(), "Referee controller stopped");
    }

    fn apply(&mut self, command: Command) -> Result<(), RefereeError> {
        let referee = &mut self.referee;
        match command {
            Command::StartGame => referee.start_game(),
            Command::PauseGame => referee.pause_game(),
            Command::ResumeGame => referee.resume_game(),
            Command::StopGame => referee.stop_game(),
            Command::ResetMatch => {
                let previous = referee.match_id();
                *referee = Referee::new(self.settings.clone());
                info!(previous = %previous, match_id = %referee.match_id(), "Match reset");
                Ok(())
            }
            Command::SwapSides => referee.swap_sides(),
            Command::AddPenalty {
                robot,
                seconds,
                reason,
            } => referee.add_penalty(robot, seconds, reason),
            Command::CancelPenalty { robot } => referee.cancel_penalty(robot),
            Command::IncrementScore { team, delta } => referee.increment_score(team, delta),
            Command::ResetScore => referee.reset_score(),
            Command::ReportGoal { team } => referee.report_goal(team),
            Command::ValidateGoal { valid } => referee.validate_goal(valid),
            Command::StartHalfTime => referee.start_half_time(),
            Command::AdvanceHalfTime { choice } => referee.advance_half_time(choice),
            Command::AbortHalfTime => referee.abort_half_time(),
            Command::SetTeamName { team, name } => {
                referee.set_team_name(team, &name);
                Ok(())
            }
            Command::SetKey { team, key } => {
                referee.set_key(team, key);
                Ok(())
            }
            Command::AllowControl { team, allow } => {
                referee.allow_control(team, allow);
                Ok(())
            }
            Command::PlaceGame { pattern } => referee.place_game(pattern),
            Command::Emergency => {
                referee.emergency();
                Ok(())
            }
            Command::ControlPacket {
                team,
                number,
                key,
                command,
            } => referee.control_packet(team, number, &key, command),
        }
    }

    /// Forward collaborator requests, then swap in a fresh snapshot
    fn publish(&mut self) {
        for dispatch in self.referee.take_dispatches() {
            // No subscribers is fine; collaborators may not be connected yet
            let _ = self.dispatch_tx.send(ServerMsg::from(dispatch));
        }
        self.state_tx
            .send_replace(Arc::new(Published::capture(&self.referee)));
    }
}

/// Cloneable entry point to the controller
#[derive(Clone)]
pub struct RefereeHandle {
    command_tx: mpsc::Sender<Envelope>,
    state_rx: watch::Receiver<Arc<Published>>,
    dispatch_tx: broadcast::Sender<ServerMsg>,
}

impl RefereeHandle {
    /// Submit a command and wait for it to be applied
    pub async fn send(&self, command: Command) -> Result<(), RefereeError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Envelope { command, reply })
            .await
            .map_err(|_| RefereeError::ControllerUnavailable)?;
        reply_rx
            .await
            .map_err(|_| RefereeError::ControllerUnavailable)?
    }

    pub async fn start_game(&self) -> Result<(), RefereeError> {
        self.send(Command::StartGame).await
    }

    pub async fn pause_game(&self) -> Result<(), RefereeError> {
        self.send(Command::PauseGame).await
    }

    pub async fn resume_game(&self) -> Result<(), RefereeError> {
        self.send(Command::ResumeGame).await
    }

    pub async fn stop_game(&self) -> Result<(), RefereeError> {
        self.send(Command::StopGame).await
    }

    pub async fn reset_match(&self) -> Result<(), RefereeError> {
        self.send(Command::ResetMatch).await
    }

    pub async fn add_penalty(
        &self,
        robot: RobotId,
        seconds: Option<f64>,
        reason: Option<String>,
    ) -> Result<(), RefereeError> {
        self.send(Command::AddPenalty {
            robot,
            seconds,
            reason,
        })
        .await
    }

    pub async fn cancel_penalty(&self, robot: RobotId) -> Result<(), RefereeError> {
        self.send(Command::CancelPenalty { robot }).await
    }

    pub async fn increment_score(&self, team: TeamColor, delta: i32) -> Result<(), RefereeError> {
        self.send(Command::IncrementScore { team, delta }).await
    }

    pub async fn reset_score(&self) -> Result<(), RefereeError> {
        self.send(Command::ResetScore).await
    }

    pub async fn swap_sides(&self) -> Result<(), RefereeError> {
        self.send(Command::SwapSides).await
    }

    pub async fn report_goal(&self, team: TeamColor) -> Result<(), RefereeError> {
        self.send(Command::ReportGoal { team }).await
    }

    pub async fn validate_goal(&self, valid: bool) -> Result<(), RefereeError> {
        self.send(Command::ValidateGoal { valid }).await
    }

    pub async fn start_half_time(&self) -> Result<(), RefereeError> {
        self.send(Command::StartHalfTime).await
    }

    pub async fn advance_half_time(&self, choice: HalfTimeChoice) -> Result<(), RefereeError> {
        self.send(Command::AdvanceHalfTime { choice }).await
    }

    pub async fn abort_half_time(&self) -> Result<(), RefereeError> {
        self.send(Command::AbortHalfTime).await
    }

    pub async fn set_team_name(&self, team: TeamColor, name: String) -> Result<(), RefereeError> {
        self.send(Command::SetTeamName { team, name }).await
    }

    pub async fn set_key(&self, team: TeamColor, key: String) -> Result<(), RefereeError> {
        self.send(Command::SetKey { team, key }).await
    }

    pub async fn allow_control(&self, team: TeamColor, allow: bool) -> Result<(), RefereeError> {
        self.send(Command::AllowControl { team, allow }).await
    }

    pub async fn place_game(&self, pattern: PlacementPattern) -> Result<(), RefereeError> {
        self.send(Command::PlaceGame { pattern }).await
    }

    pub async fn emergency(&self) -> Result<(), RefereeError> {
        self.send(Command::Emergency).await
    }

    pub async fn control_packet(
        &self,
        team: TeamColor,
        number: u8,
        key: String,
        command: RobotCommand,
    ) -> Result<(), RefereeError> {
        self.send(Command::ControlPacket {
            team,
            number,
            key,
            command,
        })
        .await
    }

    /// Latest published state; never waits on the controller
    pub fn published(&self) -> Arc<Published> {
        Arc::clone(&self.state_rx.borrow())
    }

    pub fn snapshot(&self) -> MatchView {
        self.published().view.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Arc<Published>> {
        self.state_rx.clone()
    }

    pub fn subscribe_dispatches(&self) -> broadcast::Receiver<ServerMsg> {
        self.dispatch_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::game::referee::Phase;

    fn green1() -> RobotId {
        RobotId::new(TeamColor::Green, 1)
    }

    #[tokio::test]
    async fn commands_apply_in_order() {
        let handle = RefereeController::spawn(MatchSettings::default());

        assert_ok!(handle.start_game().await);
        assert_ok!(handle.pause_game().await);
        assert_err!(handle.pause_game().await);
        assert_ok!(handle.resume_game().await);

        let view = handle.snapshot();
        assert_eq!(view.phase, Phase::Running);
        let sequences: Vec<u64> = handle.published().events_since(None).iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn invalid_transition_reported_to_caller() {
        let handle = RefereeController::spawn(MatchSettings::default());
        let err = handle.resume_game().await.unwrap_err();
        assert_eq!(
            err,
            RefereeError::InvalidTransition {
                command: "resume_game",
                phase: Phase::NotStarted
            }
        );
        assert!(handle.published().events_since(None).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn penalty_expires_on_wall_clock() {
        let handle = RefereeController::spawn(MatchSettings::default());
        assert_ok!(handle.start_game().await);
        assert_ok!(handle.add_penalty(green1(), Some(1.0), None).await);
        assert_eq!(
            handle.snapshot().robot(green1()).unwrap().penalty_remaining,
            Some(1.0)
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let view = handle.snapshot();
        let robot = view.robot(green1()).unwrap();
        assert_eq!(robot.penalty_remaining, None);
        assert!(robot.preemption_reasons.is_empty());
        assert!(view.timer_seconds < 300);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_match_keeps_its_time() {
        let handle = RefereeController::spawn(MatchSettings::default());
        assert_ok!(handle.start_game().await);
        assert_ok!(handle.pause_game().await);
        let before = handle.snapshot().timer_seconds;

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_ok!(handle.resume_game().await);
        assert_eq!(handle.snapshot().timer_seconds, before);
    }

    #[tokio::test]
    async fn reset_starts_a_fresh_match() {
        let handle = RefereeController::spawn(MatchSettings::default());
        assert_ok!(handle.start_game().await);
        assert_ok!(handle.increment_score(TeamColor::Blue, 1).await);
        let first = handle.snapshot().match_id;

        assert_ok!(handle.reset_match().await);
        let view = handle.snapshot();
        assert_ne!(view.match_id, first);
        assert_eq!(view.phase, Phase::NotStarted);
        assert_eq!(view.team(TeamColor::Blue).unwrap().score, 0);
        assert!(handle.published().events_since(None).is_empty());

        assert_ok!(handle.start_game().await);
        assert_eq!(handle.published().events_since(None)[0].sequence, 0);
    }

    #[tokio::test]
    async fn dispatches_reach_subscribers() {
        let handle = RefereeController::spawn(MatchSettings::default());
        let mut dispatches = handle.subscribe_dispatches();

        assert_ok!(handle.emergency().await);
        let msg = assert_ok!(dispatches.recv().await);
        assert!(matches!(msg, ServerMsg::Halt));
        assert_eq!(handle.snapshot().phase, Phase::NotStarted);
    }

    #[tokio::test]
    async fn half_time_and_control_through_handle() {
        let handle = RefereeController::spawn(MatchSettings::default());
        let mut dispatches = handle.subscribe_dispatches();

        assert_ok!(handle.start_game().await);
        assert_ok!(handle.start_half_time().await);
        assert_err!(handle.advance_half_time(HalfTimeChoice::StartSecondHalf).await);
        assert_ok!(handle.advance_half_time(HalfTimeChoice::GentlySwapSide).await);
        let msg = assert_ok!(dispatches.recv().await);
        assert!(matches!(msg, ServerMsg::Placement { .. }));

        let view = handle.snapshot();
        assert_eq!(view.phase, Phase::Paused);
        assert_eq!(view.x_positive_team, TeamColor::Blue);
        assert_ok!(handle.resume_game().await);

        assert_ok!(handle.set_key(TeamColor::Green, "k".into()).await);
        assert_ok!(handle.allow_control(TeamColor::Green, true).await);
        let command = RobotCommand::Kick { power: 0.5 };
        assert_eq!(
            handle
                .control_packet(TeamColor::Green, 1, "nope".into(), command)
                .await,
            Err(RefereeError::UnauthorizedControl {
                team: TeamColor::Green
            })
        );
        assert_ok!(
            handle
                .control_packet(TeamColor::Green, 1, "k".into(), command)
                .await
        );
        let msg = assert_ok!(dispatches.recv().await);
        assert!(matches!(msg, ServerMsg::RobotCommand { robot, .. } if robot == green1()));
        assert_eq!(handle.snapshot().team(TeamColor::Green).unwrap().packets_received, 1);
    }

    #[tokio::test]
    async fn closed_controller_is_unavailable() {
        let (controller, handle) = RefereeController::new(MatchSettings::default());
        drop(controller);
        assert_eq!(
            handle.start_game().await,
            Err(RefereeError::ControllerUnavailable)
        );
    }
}
