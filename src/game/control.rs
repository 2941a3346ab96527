//! Per-team authorization of robot control traffic

use serde::{Deserialize, Serialize};

use crate::util::secret::secrets_match;

use super::team::{PerTeam, TeamColor};

/// Control link state of one team
#[derive(Debug, Clone, Default)]
pub struct TeamControl {
    pub key: String,
    pub allow_control: bool,
    pub packets_received: u64,
    /// Seconds since the last authorized packet, `None` if never
    pub last_message_age: Option<f64>,
}

/// Command carried by a control packet, forwarded to the motion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RobotCommand {
    /// Body-frame velocity order (m/s, m/s, rad/s)
    Control { dx: f64, dy: f64, dturn: f64 },
    Kick { power: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct TeamControlGate {
    teams: PerTeam<TeamControl>,
}

impl TeamControlGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, team: TeamColor, key: String) {
        self.teams[team].key = key;
    }

    pub fn allow_control(&mut self, team: TeamColor, allow: bool) {
        self.teams[team].allow_control = allow;
    }

    /// Check a presented key. Authorized packets are counted and refresh liveness.
    pub fn authorize(&mut self, team: TeamColor, presented_key: &str) -> bool {
        let control = &mut self.teams[team];
        if !control.allow_control || !secrets_match(presented_key, &control.key) {
            return false;
        }
        control.packets_received += 1;
        control.last_message_age = Some(0.0);
        true
    }

    /// Withdraw control from every team
    pub fn revoke_all(&mut self) {
        for (_, control) in self.teams.iter_mut() {
            control.allow_control = false;
        }
    }

    /// Age every link by `delta_secs` of wall time
    pub fn tick(&mut self, delta_secs: f64) {
        for (_, control) in self.teams.iter_mut() {
            if let Some(age) = control.last_message_age.as_mut() {
                *age += delta_secs;
            }
        }
    }

    pub fn team(&self, team: TeamColor) -> &TeamControl {
        &self.teams[team]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_disallowed_by_default() {
        let mut gate = TeamControlGate::new();
        assert!(!gate.authorize(TeamColor::Green, ""));
        assert_eq!(gate.team(TeamColor::Green).packets_received, 0);
        assert_eq!(gate.team(TeamColor::Green).last_message_age, None);
    }

    #[test]
    fn key_and_flag_both_required() {
        let mut gate = TeamControlGate::new();
        gate.set_key(TeamColor::Blue, "s3cret".into());
        assert!(!gate.authorize(TeamColor::Blue, "s3cret"));

        gate.allow_control(TeamColor::Blue, true);
        assert!(!gate.authorize(TeamColor::Blue, "wrong"));
        assert!(!gate.authorize(TeamColor::Blue, "s3cre"));
        assert_eq!(gate.team(TeamColor::Blue).packets_received, 0);
        assert!(gate.authorize(TeamColor::Blue, "s3cret"));
        assert_eq!(gate.team(TeamColor::Blue).packets_received, 1);
        assert!(!gate.authorize(TeamColor::Green, "s3cret"));
    }

    #[test]
    fn liveness_age_grows_and_resets() {
        let mut gate = TeamControlGate::new();
        gate.allow_control(TeamColor::Green, true);
        gate.tick(1.0);
        assert_eq!(gate.team(TeamColor::Green).last_message_age, None);

        assert!(gate.authorize(TeamColor::Green, ""));
        gate.tick(0.5);
        gate.tick(0.25);
        assert_eq!(gate.team(TeamColor::Green).last_message_age, Some(0.75));

        assert!(gate.authorize(TeamColor::Green, ""));
        assert_eq!(gate.team(TeamColor::Green).last_message_age, Some(0.0));
    }

    #[test]
    fn revoke_all_clears_flags_only() {
        let mut gate = TeamControlGate::new();
        for team in TeamColor::ALL {
            gate.set_key(team, format!("{team}-key"));
            gate.allow_control(team, true);
        }
        gate.revoke_all();
        assert!(!gate.team(TeamColor::Green).allow_control);
        assert!(!gate.team(TeamColor::Blue).allow_control);
        assert_eq!(gate.team(TeamColor::Blue).key, "blue-key");
    }
}
