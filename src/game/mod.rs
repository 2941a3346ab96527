//! Referee logic: match state machine and its sub-components

pub mod clock;
pub mod control;
pub mod controller;
pub mod events;
pub mod penalty;
pub mod placement;
pub mod referee;
pub mod score;
pub mod snapshot;
pub mod team;

pub use control::RobotCommand;
pub use controller::{RefereeController, RefereeHandle};
pub use events::RefereeEvent;
pub use placement::{PlacementOrder, PlacementPattern};
pub use referee::{Dispatch, HalfTimeChoice, Phase, RefereeError};
pub use snapshot::MatchView;
pub use team::{RobotId, TeamColor};
