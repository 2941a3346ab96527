//! Named robot placements forwarded to the positioning collaborator

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

use super::team::{RobotId, TeamColor};

/// Field length along X (m)
pub const FIELD_LENGTH: f64 = 1.84;
/// Field width along Y (m)
pub const FIELD_WIDTH: f64 = 1.23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementPattern {
    /// Kick-off formation, each team in its own half
    Standard,
    /// Robots on the four dots
    Dots,
    /// Robots lined up along the side line
    Side,
    /// Robots gathered at the center for marker swapping
    SwapCovers,
    /// Robots moved across the center line without re-identification
    GentlySwapSide,
}

/// Target pose for one robot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotTarget {
    pub robot: RobotId,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

/// A placement request as sent to the positioning collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementOrder {
    pub pattern: PlacementPattern,
    pub x_positive_team: TeamColor,
    pub targets: Vec<RobotTarget>,
}

impl PlacementOrder {
    /// Resolve a pattern into concrete targets given which team defends positive X
    pub fn resolve(pattern: PlacementPattern, x_positive_team: TeamColor) -> Self {
        let l = FIELD_LENGTH;
        let w = FIELD_WIDTH;
        let pos = x_positive_team;
        let neg = x_positive_team.other();

        // (robot, x, y, theta); standard and swap covers mirror x for the team on the negative side
        let poses: Vec<(RobotId, f64, f64, f64)> = match pattern {
            PlacementPattern::Standard => vec![
                (RobotId::new(pos, 1), l / 4.0, 0.0, PI),
                (RobotId::new(pos, 2), l / 2.0, 0.0, PI),
                (RobotId::new(neg, 1), -l / 4.0, 0.0, 0.0),
                (RobotId::new(neg, 2), -l / 2.0, 0.0, 0.0),
            ],
            // Dots, side and gentle swap are fixed per color
            PlacementPattern::Dots => vec![
                (RobotId::new(TeamColor::Green, 1), l / 4.0, -w / 4.0, PI),
                (RobotId::new(TeamColor::Green, 2), l / 4.0, w / 4.0, PI),
                (RobotId::new(TeamColor::Blue, 1), -l / 4.0, w / 4.0, 0.0),
                (RobotId::new(TeamColor::Blue, 2), -l / 4.0, -w / 4.0, 0.0),
            ],
            PlacementPattern::Side => vec![
                (RobotId::new(TeamColor::Green, 1), 0.2, w / 2.0, -FRAC_PI_2),
                (RobotId::new(TeamColor::Green, 2), 0.6, w / 2.0, -FRAC_PI_2),
                (RobotId::new(TeamColor::Blue, 1), -0.2, w / 2.0, -FRAC_PI_2),
                (RobotId::new(TeamColor::Blue, 2), -0.6, w / 2.0, -FRAC_PI_2),
            ],
            PlacementPattern::SwapCovers => vec![
                (RobotId::new(pos, 1), 0.15, -0.2, PI),
                (RobotId::new(pos, 2), 0.15, 0.2, PI),
                (RobotId::new(neg, 1), -0.15, -0.2, 0.0),
                (RobotId::new(neg, 2), -0.15, 0.2, 0.0),
            ],
            PlacementPattern::GentlySwapSide => vec![
                (RobotId::new(TeamColor::Green, 1), 0.0, -0.15, 0.0),
                (RobotId::new(TeamColor::Green, 2), 0.0, 0.5, 0.0),
                (RobotId::new(TeamColor::Blue, 1), 0.0, -0.5, PI),
                (RobotId::new(TeamColor::Blue, 2), 0.0, 0.15, PI),
            ],
        };

        Self {
            pattern,
            x_positive_team,
            targets: poses
                .into_iter()
                .map(|(robot, x, y, theta)| RobotTarget { robot, x, y, theta })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(order: &PlacementOrder, robot: &str) -> RobotTarget {
        let id: RobotId = robot.parse().unwrap();
        *order.targets.iter().find(|t| t.robot == id).unwrap()
    }

    #[test]
    fn standard_follows_side_assignment() {
        let green_pos = PlacementOrder::resolve(PlacementPattern::Standard, TeamColor::Green);
        assert!(target(&green_pos, "green1").x > 0.0);
        assert!(target(&green_pos, "blue1").x < 0.0);

        let blue_pos = PlacementOrder::resolve(PlacementPattern::Standard, TeamColor::Blue);
        assert!(target(&blue_pos, "green1").x < 0.0);
        assert_eq!(target(&blue_pos, "blue2").x, FIELD_LENGTH / 2.0);
    }

    #[test]
    fn dots_and_side_ignore_side_assignment() {
        for pattern in [PlacementPattern::Dots, PlacementPattern::Side] {
            let green_pos = PlacementOrder::resolve(pattern, TeamColor::Green);
            let blue_pos = PlacementOrder::resolve(pattern, TeamColor::Blue);
            assert_eq!(green_pos.targets, blue_pos.targets, "{pattern:?}");
        }

        let dots = PlacementOrder::resolve(PlacementPattern::Dots, TeamColor::Blue);
        let green1 = target(&dots, "green1");
        assert_eq!((green1.x, green1.y), (FIELD_LENGTH / 4.0, -FIELD_WIDTH / 4.0));
        assert_eq!(green1.theta, PI);
        assert!(target(&dots, "blue1").x < 0.0);
    }

    #[test]
    fn every_pattern_targets_four_robots() {
        for pattern in [
            PlacementPattern::Standard,
            PlacementPattern::Dots,
            PlacementPattern::Side,
            PlacementPattern::SwapCovers,
            PlacementPattern::GentlySwapSide,
        ] {
            assert_eq!(PlacementOrder::resolve(pattern, TeamColor::Blue).targets.len(), 4);
        }
    }

    #[test]
    fn pattern_names_are_snake_case() {
        let json = serde_json::to_string(&PlacementPattern::GentlySwapSide).unwrap();
        assert_eq!(json, "\"gently_swap_side\"");
    }
}
