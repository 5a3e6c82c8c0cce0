//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the live therapy progress feed.

use crate::web::dto::ProgressResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts the feed. This must be the first message sent on the connection.
    /// Practitioners may narrow the feed to one patient.
    Init {
        #[serde(default)]
        patient_id: Option<Uuid>,
    },

    /// Asks for an immediate recomputation. Any poll still in flight is superseded.
    Refresh,

    /// Stops periodic polling until `Resume`.
    Pause,

    Resume,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the feed is running and how often it polls.
    Subscribed { poll_interval_secs: u64 },

    /// A fresh progress report. Generations only ever increase on a connection.
    Progress { generation: u64, report: ProgressResponse },

    /// Signals that polling has stopped.
    Paused,

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_client_messages() {
        let init: ClientMessage = serde_json::from_str(r#"{"type":"init"}"#).unwrap();
        assert_eq!(init, ClientMessage::Init { patient_id: None });

        let id = Uuid::new_v4();
        let init: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"init","patient_id":"{}"}}"#, id)).unwrap();
        assert_eq!(init, ClientMessage::Init { patient_id: Some(id) });

        let refresh: ClientMessage = serde_json::from_str(r#"{"type":"refresh"}"#).unwrap();
        assert_eq!(refresh, ClientMessage::Refresh);
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Paused).unwrap();
        assert_eq!(json["type"], "paused");
    }
}
