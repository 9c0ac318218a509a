//! Pure decision logic for the connection manager and its loops
//!
//! Everything here is free of I/O and shared state so the state machine can
//! be tested exhaustively.

use super::state::{ConnectionEvent, ConnectionState, LoopPlan};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pure state-machine and health decisions
pub struct HealthMonitor;

impl HealthMonitor {
    /// Next state for `(state, event)`, or `None` when the event is not
    /// allowed in that state (pure function)
    pub fn determine_next_state(
        state: ConnectionState,
        event: ConnectionEvent,
    ) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (state, event) {
            (_, Disconnected) => Some(Dead),
            (Undef | Dead, ConnectSucceeded) => Some(Alive),
            (Undef | Dead, ConnectFailed) => Some(Dead),
            (Alive, PingFailed) => Some(Polling),
            (Polling, ReconnectSucceeded) => Some(Alive),
            (Polling, RetriesExhausted) => Some(Dead),
            _ => None,
        }
    }

    /// Background loops that must run in a state (pure function)
    pub fn loops_for(state: ConnectionState) -> LoopPlan {
        LoopPlan {
            pinger: state == ConnectionState::Alive,
            poller: state == ConnectionState::Polling,
        }
    }

    /// Requests may only be sent over a live session (pure function)
    pub fn can_invoke(state: ConnectionState) -> bool {
        matches!(state, ConnectionState::Alive)
    }

    /// Decide whether the reconnect loop keeps going (pure function)
    ///
    /// `max_retries` of `None` retries forever.
    pub fn should_attempt_reconnection(
        attempts_so_far: u32,
        max_retries: Option<u32>,
        shutdown_requested: bool,
    ) -> ReconnectionDecision {
        if shutdown_requested {
            return ReconnectionDecision::AbortShutdownRequested;
        }
        if let Some(max) = max_retries {
            if attempts_so_far >= max {
                return ReconnectionDecision::AbortMaxAttemptsExceeded;
            }
        }
        ReconnectionDecision::Proceed {
            attempt: attempts_so_far.saturating_add(1),
        }
    }

    /// Classify the server link by how long ago the server was last heard
    /// from, relative to the agreed ping interval (pure function)
    pub fn assess_server_health(since_last_heard: Option<Duration>, ping_interval: Duration) -> ServerHealth {
        let Some(lap) = since_last_heard else {
            return ServerHealth::Dead;
        };
        let interval = ping_interval.as_millis();
        let lap = lap.as_millis();

        if interval == 0 {
            return ServerHealth::Good;
        }
        if lap <= interval / 2 {
            ServerHealth::VeryGood
        } else if lap <= interval {
            ServerHealth::Good
        } else if lap <= interval + interval / 2 {
            ServerHealth::Bad
        } else if lap <= interval * 2 {
            ServerHealth::VeryBad
        } else {
            ServerHealth::Dead
        }
    }

    /// Log connection state transition (pure logging function)
    pub fn log_state_transition(from: ConnectionState, to: ConnectionState) {
        match (from, to) {
            (ConnectionState::Undef | ConnectionState::Dead, ConnectionState::Alive) => {
                info!("Connection to server established");
            }
            (ConnectionState::Alive, ConnectionState::Polling) => {
                warn!("Lost connection to server, polling for reconnect");
            }
            (ConnectionState::Polling, ConnectionState::Alive) => {
                info!("Reconnected to server");
            }
            (ConnectionState::Polling, ConnectionState::Dead) => {
                error!("Giving up reconnecting to server");
            }
            (_, ConnectionState::Dead) => {
                info!("Connection is dead (was {})", from);
            }
            _ => {
                info!("Connection state: {} -> {}", from, to);
            }
        }
    }
}

/// Decision result for reconnection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectionDecision {
    /// Proceed with reconnection attempt
    Proceed { attempt: u32 },
    /// Abort reconnection - shutdown requested
    AbortShutdownRequested,
    /// Abort reconnection - max attempts exceeded
    AbortMaxAttemptsExceeded,
}

/// Server link quality derived from its ping traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerHealth {
    VeryGood,
    Good,
    Bad,
    VeryBad,
    Dead,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_connect_transitions() {
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Undef, ConnectionEvent::ConnectSucceeded),
            Some(ConnectionState::Alive)
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Undef, ConnectionEvent::ConnectFailed),
            Some(ConnectionState::Dead)
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Alive, ConnectionEvent::ConnectSucceeded),
            None
        );
    }

    #[test]
    fn test_failure_and_recovery_transitions() {
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Alive, ConnectionEvent::PingFailed),
            Some(ConnectionState::Polling)
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Polling, ConnectionEvent::ReconnectSucceeded),
            Some(ConnectionState::Alive)
        );
        assert_eq!(
            HealthMonitor::determine_next_state(ConnectionState::Polling, ConnectionEvent::PingFailed),
            None
        );
    }

    #[test]
    fn test_dead_never_reaches_polling_directly() {
        for event in ConnectionEvent::ALL {
            assert_ne!(
                HealthMonitor::determine_next_state(ConnectionState::Dead, event),
                Some(ConnectionState::Polling),
                "event {event:?}"
            );
        }
    }

    #[test]
    fn test_disconnect_from_every_state() {
        for state in [
            ConnectionState::Undef,
            ConnectionState::Alive,
            ConnectionState::Polling,
            ConnectionState::Dead,
        ] {
            assert_eq!(
                HealthMonitor::determine_next_state(state, ConnectionEvent::Disconnected),
                Some(ConnectionState::Dead)
            );
        }
    }

    #[test]
    fn test_reconnection_decision() {
        assert_eq!(
            HealthMonitor::should_attempt_reconnection(0, None, false),
            ReconnectionDecision::Proceed { attempt: 1 }
        );
        assert_eq!(
            HealthMonitor::should_attempt_reconnection(1000, None, false),
            ReconnectionDecision::Proceed { attempt: 1001 }
        );
        assert_eq!(
            HealthMonitor::should_attempt_reconnection(3, Some(3), false),
            ReconnectionDecision::AbortMaxAttemptsExceeded
        );
        assert_eq!(
            HealthMonitor::should_attempt_reconnection(0, Some(3), true),
            ReconnectionDecision::AbortShutdownRequested
        );
    }

    #[test]
    fn test_server_health_bands() {
        let interval = Duration::from_millis(10_000);
        let assess = |ms| HealthMonitor::assess_server_health(Some(Duration::from_millis(ms)), interval);

        assert_eq!(assess(5_000), ServerHealth::VeryGood);
        assert_eq!(assess(10_000), ServerHealth::Good);
        assert_eq!(assess(15_000), ServerHealth::Bad);
        assert_eq!(assess(20_000), ServerHealth::VeryBad);
        assert_eq!(assess(20_001), ServerHealth::Dead);
        assert_eq!(
            HealthMonitor::assess_server_health(None, interval),
            ServerHealth::Dead
        );
    }

    fn state_strategy() -> impl Strategy<Value = ConnectionState> {
        prop_oneof![
            Just(ConnectionState::Undef),
            Just(ConnectionState::Alive),
            Just(ConnectionState::Polling),
            Just(ConnectionState::Dead),
        ]
    }

    fn event_strategy() -> impl Strategy<Value = ConnectionEvent> {
        (0..ConnectionEvent::ALL.len()).prop_map(|i| ConnectionEvent::ALL[i])
    }

    proptest! {
        #[test]
        fn prop_pinger_and_poller_never_both_planned(
            start in state_strategy(),
            events in proptest::collection::vec(event_strategy(), 0..64)
        ) {
            let mut state = start;
            for event in events {
                if let Some(next) = HealthMonitor::determine_next_state(state, event) {
                    state = next;
                }
                let plan = HealthMonitor::loops_for(state);
                prop_assert!(!(plan.pinger && plan.poller));
                prop_assert_eq!(plan.pinger, state == ConnectionState::Alive);
            }
        }

        #[test]
        fn prop_only_alive_allows_requests(state in state_strategy()) {
            prop_assert_eq!(HealthMonitor::can_invoke(state), state == ConnectionState::Alive);
        }
    }
}
