//! Connection states and the events that move between them

use serde::Serialize;
use std::fmt;

/// Health of the link to the server as seen by the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionState {
    /// Never connected
    #[default]
    Undef,
    /// Session established and heartbeat running
    Alive,
    /// Connection lost; reconnect loop is running
    Polling,
    /// Disconnected or never reached the server
    Dead,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Undef => "UNDEF",
            ConnectionState::Alive => "ALIVE",
            ConnectionState::Polling => "POLLING",
            ConnectionState::Dead => "DEAD",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Things that can happen to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionEvent {
    /// `connect()` got a valid reply
    ConnectSucceeded,
    /// `connect()` failed at transport or protocol level
    ConnectFailed,
    /// Heartbeat ping failed
    PingFailed,
    /// Reconnect loop established a new session
    ReconnectSucceeded,
    /// Reconnect loop hit its configured attempt limit
    RetriesExhausted,
    /// Explicit `disconnect()`
    Disconnected,
}

impl ConnectionEvent {
    pub const ALL: [ConnectionEvent; 6] = [
        ConnectionEvent::ConnectSucceeded,
        ConnectionEvent::ConnectFailed,
        ConnectionEvent::PingFailed,
        ConnectionEvent::ReconnectSucceeded,
        ConnectionEvent::RetriesExhausted,
        ConnectionEvent::Disconnected,
    ];
}

/// Which background loop a state requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPlan {
    pub pinger: bool,
    pub poller: bool,
}

/// A state change that happened, as reported to listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

impl Transition {
    /// Listeners hear about changes only, except an explicit disconnect which
    /// always reports DEAD
    pub fn should_notify(&self, event: ConnectionEvent) -> bool {
        self.from != self.to || event == ConnectionEvent::Disconnected
    }
}
