//! WebSocket protocol message definitions
//! These are the wire types for push clients and collaborators

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{Dispatch, MatchView, PlacementOrder, RefereeEvent, RobotCommand, RobotId};

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Ask for events after a sequence number (all when omitted)
    Resync {
        #[serde(default)]
        since: Option<u64>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { match_id: Uuid, server_time: u64 },

    /// Full match state
    Snapshot { view: Box<MatchView> },

    /// Referee events, in sequence order
    Events {
        match_id: Uuid,
        events: Vec<RefereeEvent>,
    },

    /// Robot placement request for the positioning collaborator
    Placement { order: PlacementOrder },

    /// Stop all robots immediately
    Halt,

    /// Authorized control packet for one robot
    RobotCommand { robot: RobotId, command: RobotCommand },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl From<Dispatch> for ServerMsg {
    fn from(dispatch: Dispatch) -> Self {
        match dispatch {
            Dispatch::Place(order) => ServerMsg::Placement { order },
            Dispatch::HaltAll => ServerMsg::Halt,
            Dispatch::Robot { robot, command } => ServerMsg::RobotCommand { robot, command },
        }
    }
}
