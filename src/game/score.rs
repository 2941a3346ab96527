//! Team score counters

use super::team::{PerTeam, TeamColor};

#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    scores: PerTeam<u32>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a manual score change, clamped at zero. Returns the new score.
    pub fn increment(&mut self, team: TeamColor, delta: i32) -> u32 {
        let score = &mut self.scores[team];
        *score = if delta < 0 {
            score.saturating_sub(delta.unsigned_abs())
        } else {
            score.saturating_add(delta as u32)
        };
        *score
    }

    pub fn reset(&mut self) {
        self.scores = PerTeam::default();
    }

    pub fn get(&self, team: TeamColor) -> u32 {
        self.scores[team]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_never_goes_negative() {
        let mut board = ScoreBoard::new();
        assert_eq!(board.increment(TeamColor::Green, -1), 0);
        assert_eq!(board.increment(TeamColor::Green, 2), 2);
        assert_eq!(board.increment(TeamColor::Green, -5), 0);
    }

    #[test]
    fn reset_zeroes_both_teams() {
        let mut board = ScoreBoard::new();
        board.increment(TeamColor::Green, 1);
        board.increment(TeamColor::Blue, 3);
        board.reset();
        assert_eq!(board.get(TeamColor::Green), 0);
        assert_eq!(board.get(TeamColor::Blue), 0);
    }
}
