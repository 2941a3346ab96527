//! Team colors and robot identities

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The two fixed team colors of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamColor {
    Green,
    Blue,
}

impl TeamColor {
    pub const ALL: [TeamColor; 2] = [TeamColor::Green, TeamColor::Blue];

    pub fn as_str(self) -> &'static str {
        match self {
            TeamColor::Green => "green",
            TeamColor::Blue => "blue",
        }
    }

    /// Display name used until the operator sets one
    pub fn default_name(self) -> &'static str {
        match self {
            TeamColor::Green => "Green",
            TeamColor::Blue => "Blue",
        }
    }

    pub fn other(self) -> TeamColor {
        match self {
            TeamColor::Green => TeamColor::Blue,
            TeamColor::Blue => TeamColor::Green,
        }
    }
}

impl fmt::Display for TeamColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeamColor {
    type Err = RobotIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "green" => Ok(TeamColor::Green),
            "blue" => Ok(TeamColor::Blue),
            other => Err(RobotIdError::UnknownTeam(other.to_string())),
        }
    }
}

/// One value per team, indexable by color
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerTeam<T> {
    pub green: T,
    pub blue: T,
}

impl<T> PerTeam<T> {
    pub fn from_fn(mut f: impl FnMut(TeamColor) -> T) -> Self {
        Self {
            green: f(TeamColor::Green),
            blue: f(TeamColor::Blue),
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TeamColor, &mut T)> {
        [
            (TeamColor::Green, &mut self.green),
            (TeamColor::Blue, &mut self.blue),
        ]
        .into_iter()
    }
}

impl<T> Index<TeamColor> for PerTeam<T> {
    type Output = T;

    fn index(&self, team: TeamColor) -> &T {
        match team {
            TeamColor::Green => &self.green,
            TeamColor::Blue => &self.blue,
        }
    }
}

impl<T> IndexMut<TeamColor> for PerTeam<T> {
    fn index_mut(&mut self, team: TeamColor) -> &mut T {
        match team {
            TeamColor::Green => &mut self.green,
            TeamColor::Blue => &mut self.blue,
        }
    }
}

/// A robot on the field, written as `<color><number>` (e.g. `green1`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RobotId {
    pub team: TeamColor,
    pub number: u8,
}

impl RobotId {
    pub fn new(team: TeamColor, number: u8) -> Self {
        Self { team, number }
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.team, self.number)
    }
}

impl FromStr for RobotId {
    type Err = RobotIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| RobotIdError::Malformed(s.to_string()))?;
        let (team, number) = s.split_at(split);
        let team = team.parse()?;
        let number = number
            .parse::<u8>()
            .map_err(|_| RobotIdError::Malformed(s.to_string()))?;
        Ok(Self { team, number })
    }
}

impl TryFrom<String> for RobotId {
    type Error = RobotIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RobotId> for String {
    fn from(id: RobotId) -> Self {
        id.to_string()
    }
}

/// Robot id parsing errors
#[derive(Debug, thiserror::Error)]
pub enum RobotIdError {
    #[error("Unknown team: {0}")]
    UnknownTeam(String),

    #[error("Malformed robot id: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_id_parses_marker_form() {
        let id: RobotId = "blue2".parse().unwrap();
        assert_eq!(id, RobotId::new(TeamColor::Blue, 2));
        assert_eq!(id.to_string(), "blue2");
    }

    #[test]
    fn robot_id_rejects_garbage() {
        assert!("red1".parse::<RobotId>().is_err());
        assert!("green".parse::<RobotId>().is_err());
        assert!("green1x".parse::<RobotId>().is_err());
    }

    #[test]
    fn robot_id_serializes_as_string() {
        let json = serde_json::to_string(&RobotId::new(TeamColor::Green, 1)).unwrap();
        assert_eq!(json, "\"green1\"");
        let back: RobotId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.team, TeamColor::Green);
    }

    #[test]
    fn per_team_indexes_by_color() {
        let mut scores = PerTeam::from_fn(|_| 0u32);
        scores[TeamColor::Blue] += 2;
        assert_eq!(scores.green, 0);
        assert_eq!(scores[TeamColor::Blue], 2);
    }
}
