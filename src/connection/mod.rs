//! Resilient connection: state machine, heartbeat and reconnect loops

pub mod health_monitor;
pub mod listener;
pub mod manager;
pub mod pinger;
pub mod poller;
pub mod state;
pub mod worker;

pub use health_monitor::{HealthMonitor, ReconnectionDecision, ServerHealth};
pub use listener::{ConnectionInfo, ConnectionStateListener};
pub use manager::{ConnectionManager, ConnectionSettings};
pub use pinger::{HeartbeatTarget, Pinger, MIN_PING_INTERVAL_MS};
pub use poller::{Poller, ReconnectTarget, MIN_RETRY_DELAY_MS};
pub use state::{ConnectionEvent, ConnectionState, LoopPlan, Transition};
