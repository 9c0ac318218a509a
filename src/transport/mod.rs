//! Transport boundary
//!
//! The byte channel to the server (socket, XML-RPC, ...) lives outside this
//! crate. It is injected into the connection manager through [`Transport`].
//! Implementations must bound every call; expiry is reported as
//! [`TransportError::Timeout`] and handled exactly like a lost connection.

use crate::codec::RawMsgUnit;
use thiserror::Error;

/// Failure reported by a transport implementation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// Channel is down or the server could not be reached
    #[error("communication failure: {message}")]
    Communication { message: String },

    #[error("no response within {millis} ms")]
    Timeout { millis: u64 },

    /// The server answered with an exception document
    #[error("server exception [{error_code}]: {message}")]
    RemoteFault { error_code: String, message: String },
}

impl TransportError {
    pub fn communication<S: Into<String>>(message: S) -> Self {
        Self::Communication {
            message: message.into(),
        }
    }

    pub fn remote_fault<C: Into<String>, S: Into<String>>(error_code: C, message: S) -> Self {
        Self::RemoteFault {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

/// Outbound operations of the protocol
///
/// Session ids passed in are secrets; implementations must not log them.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send a connect request, returning the raw reply QoS
    async fn connect(&self, connect_qos: &str) -> Result<String, TransportError>;

    async fn disconnect(&self, session_id: &str, qos: &str) -> Result<bool, TransportError>;

    /// Round trip used as heartbeat; returns the reply QoS
    async fn ping(&self, session_id: &str, qos: &str) -> Result<String, TransportError>;

    async fn publish(&self, session_id: &str, msg: &RawMsgUnit) -> Result<String, TransportError>;

    /// Publish without waiting for return values
    async fn publish_oneway(
        &self,
        session_id: &str,
        msgs: &[RawMsgUnit],
    ) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        session_id: &str,
        key: &str,
        qos: &str,
    ) -> Result<String, TransportError>;

    async fn unsubscribe(
        &self,
        session_id: &str,
        key: &str,
        qos: &str,
    ) -> Result<Vec<String>, TransportError>;

    async fn erase(
        &self,
        session_id: &str,
        key: &str,
        qos: &str,
    ) -> Result<Vec<String>, TransportError>;

    async fn get(
        &self,
        session_id: &str,
        key: &str,
        qos: &str,
    ) -> Result<Vec<RawMsgUnit>, TransportError>;
}
