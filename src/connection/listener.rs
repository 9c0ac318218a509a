//! Connection state notifications

use super::state::ConnectionState;
use crate::codec::SessionName;

/// Read-only view of a connection handed to listeners
pub trait ConnectionInfo: Send + Sync {
    fn state(&self) -> ConnectionState;

    /// True once `disconnect()` ran or reconnecting was abandoned
    fn is_consumed(&self) -> bool;

    fn session_name(&self) -> Option<SessionName>;

    fn login_name(&self) -> &str;
}

/// Receives state transitions
///
/// Callbacks run synchronously on the task that detected the transition.
/// Keep them short and never call back into the connection's async
/// operations from inside them.
pub trait ConnectionStateListener: Send + Sync {
    fn reached_alive(&self, _old: ConnectionState, _connection: &dyn ConnectionInfo) {}

    fn reached_polling(&self, _old: ConnectionState, _connection: &dyn ConnectionInfo) {}

    fn reached_dead(&self, _old: ConnectionState, _connection: &dyn ConnectionInfo) {}
}
