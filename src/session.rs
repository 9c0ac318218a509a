//! Live session data held by the connection manager

use crate::codec::{ConnectReturnQos, SessionName};
use std::fmt;

/// Everything known about an established session
///
/// Created on a successful connect, replaced on reconnect, dropped on
/// disconnect. The secret session id is redacted from `Debug` output.
#[derive(Clone)]
pub struct SessionDescriptor {
    session_id: String,
    connect_qos: ConnectReturnQos,
    ping_interval_millis: u64,
    retry_delay_millis: u64,
}

impl SessionDescriptor {
    pub fn new(
        connect_qos: ConnectReturnQos,
        ping_interval_millis: u64,
        retry_delay_millis: u64,
    ) -> Self {
        Self {
            session_id: connect_qos.secret_session_id(),
            connect_qos,
            ping_interval_millis,
            retry_delay_millis,
        }
    }

    /// Secret session id sent with every request; never log it
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn connect_qos(&self) -> &ConnectReturnQos {
        &self.connect_qos
    }

    pub fn session_name(&self) -> Option<SessionName> {
        self.connect_qos.session_name()
    }

    pub fn ping_interval_millis(&self) -> u64 {
        self.ping_interval_millis
    }

    pub fn retry_delay_millis(&self) -> u64 {
        self.retry_delay_millis
    }
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("session_id", &"***")
            .field("session_name", &self.session_name().map(|n| n.to_string()))
            .field("ping_interval_millis", &self.ping_interval_millis)
            .field("retry_delay_millis", &self.retry_delay_millis)
            .finish()
    }
}
