//! Failsafe connection manager
//!
//! Owns the connection state machine, the session, the two background loops
//! and the listener fan-out. All transitions go through [`Inner::apply`]
//! while the async transition lock is held, so a failing heartbeat, a
//! successful reconnect and an explicit `disconnect()` are serialised.

use super::health_monitor::{HealthMonitor, ServerHealth};
use super::listener::{ConnectionInfo, ConnectionStateListener};
use super::pinger::{HeartbeatTarget, Pinger};
use super::poller::{Poller, ReconnectTarget};
use super::state::{ConnectionEvent, ConnectionState, Transition};
use crate::callback::{CallbackDispatcher, UpdateHandler};
use crate::codec::qos::DEFAULT_DISCONNECT_QOS;
use crate::codec::{
    decode_connect_result, encode_connect_qos, CallbackAddress, ConnectOptions, ConnectReturnQos,
    EraseReturnQos, Key, MsgUnit, PublishReturnQos, SessionName, StatusQos, SubscribeReturnQos,
    UnSubscribeReturnQos,
};
use crate::error::{ClientError, ClientResult};
use crate::observability::metrics::ConnectionMetrics;
use crate::session::SessionDescriptor;
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// Default delay between reconnect attempts
pub const DEFAULT_RETRY_DELAY_MS: i64 = 5000;

/// Default bound on every transport call
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(60_000);

/// Everything needed to open and keep a session
#[derive(Clone)]
pub struct ConnectionSettings {
    login_name: String,
    password: String,
    callback: Option<CallbackAddress>,
    connect_options: ConnectOptions,
    retry_delay_millis: i64,
    max_retries: Option<u32>,
    response_timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn new<L: Into<String>, P: Into<String>>(login_name: L, password: P) -> Self {
        Self {
            login_name: login_name.into(),
            password: password.into(),
            callback: None,
            connect_options: ConnectOptions::default(),
            retry_delay_millis: DEFAULT_RETRY_DELAY_MS,
            max_retries: None,
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
        }
    }

    pub fn with_callback(mut self, callback: CallbackAddress) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_connect_options(mut self, options: ConnectOptions) -> Self {
        self.connect_options = options;
        self
    }

    pub fn with_retry_delay(mut self, millis: i64) -> Self {
        self.retry_delay_millis = millis;
        self
    }

    /// `None` keeps reconnecting forever
    pub fn with_max_retries(mut self, max_retries: Option<u32>) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// `None` waits on the transport without bound
    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    pub fn callback(&self) -> Option<&CallbackAddress> {
        self.callback.as_ref()
    }

    pub fn connect_options(&self) -> &ConnectOptions {
        &self.connect_options
    }

    pub fn retry_delay_millis(&self) -> i64 {
        self.retry_delay_millis
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout
    }

    /// Connect request as sent to the server, password replaced
    pub fn redacted_connect_qos(&self) -> String {
        encode_connect_qos(
            &self.login_name,
            "***",
            self.callback.as_ref(),
            &self.connect_options,
        )
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("login_name", &self.login_name)
            .field("password", &"***")
            .field("callback", &self.callback.as_ref().map(|cb| &cb.address))
            .field("connect_options", &self.connect_options)
            .field("retry_delay_millis", &self.retry_delay_millis)
            .field("max_retries", &self.max_retries)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

#[derive(Default)]
struct SharedState {
    state: ConnectionState,
    session: Option<SessionDescriptor>,
    consumed: bool,
}

struct Inner<T: Transport + 'static> {
    transport: Arc<T>,
    settings: ConnectionSettings,
    connect_qos: String,
    callback_session_id: Option<String>,
    shared: Mutex<SharedState>,
    transition: tokio::sync::Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn ConnectionStateListener>>>,
    pinger: Pinger,
    poller: Poller,
    dispatcher: Arc<CallbackDispatcher>,
    metrics: Arc<ConnectionMetrics>,
    self_ref: Weak<Inner<T>>,
}

/// Client connection that survives server outages
///
/// Cheap to clone; all clones share one session. After `disconnect()` the
/// instance is consumed and every further call fails with
/// `communication.noConnection.dead`.
pub struct ConnectionManager<T: Transport + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport + 'static> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport + 'static> ConnectionManager<T> {
    pub fn new(transport: Arc<T>, mut settings: ConnectionSettings) -> Self {
        let callback_session_id = settings.callback.as_mut().map(|callback| {
            callback
                .session_id
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone()
        });
        let connect_qos = encode_connect_qos(
            &settings.login_name,
            &settings.password,
            settings.callback.as_ref(),
            &settings.connect_options,
        );

        let metrics = Arc::new(ConnectionMetrics::new());
        let pinger = Pinger::new(settings.connect_options.ping_interval(), metrics.clone());
        let poller = Poller::new(
            settings.retry_delay_millis,
            settings.max_retries,
            metrics.clone(),
        );
        let dispatcher = Arc::new(CallbackDispatcher::new(metrics.clone()));

        let inner = Arc::new_cyclic(|self_ref| Inner {
            transport,
            settings,
            connect_qos,
            callback_session_id,
            shared: Mutex::new(SharedState::default()),
            transition: tokio::sync::Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            pinger,
            poller,
            dispatcher,
            metrics,
            self_ref: self_ref.clone(),
        });
        Self { inner }
    }

    /// Log in; from UNDEF, or from DEAD after a failed connect
    pub async fn connect(&self) -> ClientResult<ConnectReturnQos> {
        let span = crate::connection_span!(login = %self.inner.settings.login_name);
        self.inner.connect().instrument(span).await
    }

    /// Log out and release everything; the instance cannot be reused
    ///
    /// Returns whether the server acknowledged the logout. The server is only
    /// contacted while the connection is ALIVE.
    pub async fn disconnect(&self, qos: Option<&str>) -> ClientResult<bool> {
        let span = crate::connection_span!(login = %self.inner.settings.login_name);
        self.inner.disconnect(qos).instrument(span).await
    }

    pub async fn publish(&self, msg: &MsgUnit) -> ClientResult<PublishReturnQos> {
        let raw = msg.to_raw();
        let transport = &self.inner.transport;
        let reply = self
            .inner
            .request("publish", |session_id| async move {
                transport.publish(&session_id, &raw).await
            })
            .await?;
        StatusQos::parse(&reply)
    }

    /// Publish without return values
    pub async fn publish_oneway(&self, msgs: &[MsgUnit]) -> ClientResult<()> {
        let raws: Vec<_> = msgs.iter().map(MsgUnit::to_raw).collect();
        let transport = &self.inner.transport;
        self.inner
            .request("publishOneway", |session_id| async move {
                transport.publish_oneway(&session_id, &raws).await
            })
            .await
    }

    pub async fn subscribe(&self, key: &Key, qos: &str) -> ClientResult<SubscribeReturnQos> {
        let key_xml = key.to_xml();
        let transport = &self.inner.transport;
        let reply = self
            .inner
            .request("subscribe", |session_id| async move {
                transport.subscribe(&session_id, &key_xml, qos).await
            })
            .await?;
        StatusQos::parse(&reply)
    }

    pub async fn unsubscribe(&self, key: &Key, qos: &str) -> ClientResult<Vec<UnSubscribeReturnQos>> {
        let key_xml = key.to_xml();
        let transport = &self.inner.transport;
        let replies = self
            .inner
            .request("unSubscribe", |session_id| async move {
                transport.unsubscribe(&session_id, &key_xml, qos).await
            })
            .await?;
        replies.iter().map(|reply| StatusQos::parse(reply)).collect()
    }

    pub async fn erase(&self, key: &Key, qos: &str) -> ClientResult<Vec<EraseReturnQos>> {
        let key_xml = key.to_xml();
        let transport = &self.inner.transport;
        let replies = self
            .inner
            .request("erase", |session_id| async move {
                transport.erase(&session_id, &key_xml, qos).await
            })
            .await?;
        replies.iter().map(|reply| StatusQos::parse(reply)).collect()
    }

    /// Synchronous access to messages matching `key`
    pub async fn get(&self, key: &Key, qos: &str) -> ClientResult<Vec<MsgUnit>> {
        let key_xml = key.to_xml();
        let transport = &self.inner.transport;
        let raws = self
            .inner
            .request("get", |session_id| async move {
                transport.get(&session_id, &key_xml, qos).await
            })
            .await?;
        raws.into_iter().map(MsgUnit::from_raw).collect()
    }

    /// User-issued ping; a failure is returned and never changes the state
    pub async fn ping(&self) -> ClientResult<StatusQos> {
        let transport = &self.inner.transport;
        let reply = self
            .inner
            .request("ping", |session_id| async move {
                transport.ping(&session_id, "<qos/>").await
            })
            .await?;
        StatusQos::parse(&reply)
    }

    /// Route updates for this client's callback session to `handler`
    pub fn set_update_handler(&self, handler: Arc<dyn UpdateHandler>) -> ClientResult<()> {
        let Some(cb_session_id) = &self.inner.callback_session_id else {
            return Err(ClientError::illegal_argument(
                "no callback address configured, updates cannot be delivered",
            ));
        };
        self.inner.dispatcher.register(cb_session_id.clone(), handler);
        Ok(())
    }

    pub fn add_listener(&self, listener: Arc<dyn ConnectionStateListener>) {
        self.inner.listeners.write().push(listener);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_alive(&self) -> bool {
        self.state() == ConnectionState::Alive
    }

    pub fn is_polling(&self) -> bool {
        self.state() == ConnectionState::Polling
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ConnectionState::Dead
    }

    pub fn is_consumed(&self) -> bool {
        self.inner.is_consumed()
    }

    pub fn session_name(&self) -> Option<SessionName> {
        ConnectionInfo::session_name(self.inner.as_ref())
    }

    pub fn login_name(&self) -> &str {
        &self.inner.settings.login_name
    }

    /// Secret the server must present with callbacks, if a callback is configured
    pub fn callback_session_id(&self) -> Option<&str> {
        self.inner.callback_session_id.as_deref()
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.inner.settings
    }

    pub fn dispatcher(&self) -> &Arc<CallbackDispatcher> {
        &self.inner.dispatcher
    }

    pub fn metrics(&self) -> &Arc<ConnectionMetrics> {
        &self.inner.metrics
    }

    pub fn is_pinger_running(&self) -> bool {
        self.inner.pinger.is_running()
    }

    pub fn is_poller_running(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Link quality judged from the server's callback pings
    pub fn server_health(&self) -> ServerHealth {
        let interval = Duration::from_millis(self.inner.pinger.sleep_millis());
        self.inner.dispatcher.server_health(interval)
    }
}

impl<T: Transport + 'static> ConnectionInfo for ConnectionManager<T> {
    fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    fn is_consumed(&self) -> bool {
        self.inner.is_consumed()
    }

    fn session_name(&self) -> Option<SessionName> {
        ConnectionInfo::session_name(self.inner.as_ref())
    }

    fn login_name(&self) -> &str {
        &self.inner.settings.login_name
    }
}

impl<T: Transport + 'static> Inner<T> {
    async fn connect(&self) -> ClientResult<ConnectReturnQos> {
        let _transition = self.transition.lock().await;
        let state = {
            let shared = self.shared.lock();
            if shared.consumed {
                return Err(ClientError::not_connected(
                    ConnectionState::Dead,
                    "connection was disconnected, create a new instance",
                ));
            }
            shared.state
        };
        if HealthMonitor::determine_next_state(state, ConnectionEvent::ConnectSucceeded).is_none()
        {
            return Err(ClientError::illegal_state(format!(
                "connect() is not allowed while {state}"
            )));
        }

        match self.establish_session().await {
            Ok(session) => {
                let reply = session.connect_qos().clone();
                info!(
                    session = ?session.session_name().map(|n| n.absolute_name()),
                    "Connected"
                );
                self.apply(ConnectionEvent::ConnectSucceeded, Some(session));
                Ok(reply)
            }
            Err(err) => {
                warn!(error_code = %err.error_code(), error = %err, "Connect failed");
                self.apply(ConnectionEvent::ConnectFailed, None);
                Err(err)
            }
        }
    }

    async fn disconnect(&self, qos: Option<&str>) -> ClientResult<bool> {
        {
            let mut shared = self.shared.lock();
            if shared.consumed {
                return Err(ClientError::not_connected(
                    ConnectionState::Dead,
                    "connection is already disconnected",
                ));
            }
            shared.consumed = true;
        }

        self.pinger.shutdown().await;
        self.poller.shutdown().await;

        let _transition = self.transition.lock().await;
        // A loop may have been restarted while we waited for the lock
        self.pinger.stop();
        self.poller.stop();

        let live_session = {
            let shared = self.shared.lock();
            match (&shared.state, &shared.session) {
                (ConnectionState::Alive, Some(session)) => Some(session.session_id().to_string()),
                _ => None,
            }
        };

        let mut acknowledged = false;
        if let Some(session_id) = live_session {
            let qos = qos.unwrap_or(DEFAULT_DISCONNECT_QOS);
            match self.call(self.transport.disconnect(&session_id, qos)).await {
                Ok(ack) => acknowledged = ack,
                Err(err) => warn!(error = %err, "Server logout failed, closing anyway"),
            }
        }

        if let Some(cb_session_id) = &self.callback_session_id {
            self.dispatcher.unregister(cb_session_id);
        }
        self.apply(ConnectionEvent::Disconnected, None);
        info!(acknowledged, "Disconnected");
        Ok(acknowledged)
    }

    async fn establish_session(&self) -> ClientResult<SessionDescriptor> {
        let reply = self.call(self.transport.connect(&self.connect_qos)).await?;
        let connect_qos = decode_connect_result(&reply)?;
        Ok(SessionDescriptor::new(
            connect_qos,
            self.pinger.sleep_millis(),
            self.poller.sleep_millis(),
        ))
    }

    /// Run one transport call under the response timeout
    async fn call<R, F>(&self, operation: F) -> ClientResult<R>
    where
        F: Future<Output = Result<R, TransportError>>,
    {
        match self.settings.response_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation).await {
                Ok(result) => result.map_err(ClientError::from),
                Err(_) => Err(ClientError::Transport(TransportError::Timeout {
                    millis: limit.as_millis() as u64,
                })),
            },
            None => operation.await.map_err(ClientError::from),
        }
    }

    async fn request<R, F, Fut>(&self, operation: &'static str, send: F) -> ClientResult<R>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let session_id = self.live_session_id()?;
        let result = self.call(send(session_id)).await;
        self.metrics.record_request(result.is_ok());
        if let Err(err) = &result {
            debug!(operation, error_code = %err.error_code(), error = %err, "Request failed");
        }
        result
    }

    fn live_session_id(&self) -> ClientResult<String> {
        let shared = self.shared.lock();
        if shared.consumed {
            return Err(ClientError::not_connected(
                ConnectionState::Dead,
                "connection was disconnected, create a new instance",
            ));
        }
        if !HealthMonitor::can_invoke(shared.state) {
            return Err(ClientError::not_connected(
                shared.state,
                format!("no session, connection is {}", shared.state),
            ));
        }
        shared
            .session
            .as_ref()
            .map(|session| session.session_id().to_string())
            .ok_or_else(|| ClientError::not_connected(shared.state, "no session"))
    }

    /// Perform a transition; caller holds the transition lock
    fn apply(
        &self,
        event: ConnectionEvent,
        session: Option<SessionDescriptor>,
    ) -> Option<Transition> {
        let transition = {
            let mut shared = self.shared.lock();
            let from = shared.state;
            let Some(to) = HealthMonitor::determine_next_state(from, event) else {
                debug!(state = %from, ?event, "Event ignored in current state");
                return None;
            };
            shared.state = to;
            match event {
                ConnectionEvent::ConnectSucceeded | ConnectionEvent::ReconnectSucceeded => {
                    shared.session = session;
                }
                ConnectionEvent::ConnectFailed
                | ConnectionEvent::Disconnected
                | ConnectionEvent::RetriesExhausted => shared.session = None,
                ConnectionEvent::PingFailed => {}
            }
            if matches!(
                event,
                ConnectionEvent::Disconnected | ConnectionEvent::RetriesExhausted
            ) {
                shared.consumed = true;
            }
            Transition { from, to }
        };

        self.metrics.record_transition();
        if transition.from != transition.to {
            HealthMonitor::log_state_transition(transition.from, transition.to);
        }

        let plan = HealthMonitor::loops_for(transition.to);
        if !plan.pinger {
            self.pinger.stop();
        }
        if !plan.poller {
            self.poller.stop();
        }

        if transition.should_notify(event) {
            self.notify(transition);
        }

        if plan.pinger {
            let target: Weak<dyn HeartbeatTarget> = self.self_ref.clone();
            self.pinger.start(target);
        }
        if plan.poller {
            let target: Weak<dyn ReconnectTarget> = self.self_ref.clone();
            self.poller.start(target);
        }
        Some(transition)
    }

    fn notify(&self, transition: Transition) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            match transition.to {
                ConnectionState::Alive => listener.reached_alive(transition.from, self),
                ConnectionState::Polling => listener.reached_polling(transition.from, self),
                ConnectionState::Dead => listener.reached_dead(transition.from, self),
                ConnectionState::Undef => {}
            }
        }
    }

    /// Log out a session nobody will use any more
    async fn discard_session(&self, session: &SessionDescriptor) {
        if let Err(err) = self
            .call(
                self.transport
                    .disconnect(session.session_id(), DEFAULT_DISCONNECT_QOS),
            )
            .await
        {
            debug!(error = %err, "Could not log out discarded session");
        }
    }

    fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    fn is_consumed(&self) -> bool {
        self.shared.lock().consumed
    }
}

impl<T: Transport + 'static> ConnectionInfo for Inner<T> {
    fn state(&self) -> ConnectionState {
        Inner::state(self)
    }

    fn is_consumed(&self) -> bool {
        Inner::is_consumed(self)
    }

    fn session_name(&self) -> Option<SessionName> {
        self.shared
            .lock()
            .session
            .as_ref()
            .and_then(SessionDescriptor::session_name)
    }

    fn login_name(&self) -> &str {
        &self.settings.login_name
    }
}

#[async_trait]
impl<T: Transport + 'static> HeartbeatTarget for Inner<T> {
    async fn heartbeat(&self) -> ClientResult<()> {
        let session_id = self.live_session_id()?;
        self.call(self.transport.ping(&session_id, "<qos/>"))
            .await
            .map(|_| ())
    }

    async fn heartbeat_failed(&self, error: ClientError) {
        let _transition = self.transition.lock().await;
        if self.is_consumed() {
            return;
        }
        debug!(error_code = %error.error_code(), "Heartbeat failure reported");
        self.apply(ConnectionEvent::PingFailed, None);
    }
}

#[async_trait]
impl<T: Transport + 'static> ReconnectTarget for Inner<T> {
    async fn try_reconnect(&self) -> ClientResult<SessionDescriptor> {
        self.establish_session().await
    }

    async fn reconnected(&self, session: SessionDescriptor) {
        let transition = self.transition.lock().await;
        let accept = !self.is_consumed() && self.state() == ConnectionState::Polling;
        if !accept {
            drop(transition);
            debug!("Discarding session established after the connection was closed");
            self.discard_session(&session).await;
            return;
        }
        self.metrics.record_reconnect();
        self.apply(ConnectionEvent::ReconnectSucceeded, Some(session));
    }

    async fn reconnect_abandoned(&self, attempts: u32) {
        let _transition = self.transition.lock().await;
        if self.is_consumed() {
            return;
        }
        error!(attempts, "Reconnect attempts exhausted, giving up");
        self.apply(ConnectionEvent::RetriesExhausted, None);
        if let Some(cb_session_id) = &self.callback_session_id {
            self.dispatcher.unregister(cb_session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{MockTransport, RecordingListener};

    fn manager(transport: &Arc<MockTransport>) -> ConnectionManager<MockTransport> {
        ConnectionManager::new(transport.clone(), ConnectionSettings::new("joe", "secret"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reaches_alive_and_starts_pinger() {
        // Arrange
        let transport = Arc::new(MockTransport::new());
        let manager = manager(&transport);
        let listener = Arc::new(RecordingListener::new());
        manager.add_listener(listener.clone());

        // Act
        let reply = manager.connect().await.expect("connects");

        // Assert
        assert_eq!(reply.secret_session_id(), "session-1");
        assert!(manager.is_alive());
        assert!(manager.is_pinger_running());
        assert!(!manager.is_poller_running());
        assert_eq!(listener.events(), vec!["UNDEF->ALIVE".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connect_leaves_dead_but_retryable() {
        let transport = Arc::new(MockTransport::new());
        transport.set_connect_failing(true);
        let manager = manager(&transport);

        let err = manager.connect().await.unwrap_err();
        assert!(err.is_communication_failure());
        assert!(manager.is_dead());
        assert!(!manager.is_consumed());
        assert!(!manager.is_poller_running());

        transport.set_connect_failing(false);
        manager.connect().await.expect("second attempt connects");
        assert!(manager.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_twice_is_illegal() {
        let transport = Arc::new(MockTransport::new());
        let manager = manager(&transport);
        manager.connect().await.expect("connects");

        let err = manager.connect().await.unwrap_err();

        assert_eq!(err.error_code(), "internal.illegalState");
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_before_connect_fail_fast() {
        let transport = Arc::new(MockTransport::new());
        let manager = manager(&transport);

        let err = manager
            .publish(&MsgUnit::new(Key::default(), "x", Default::default()))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "user.notConnected");
        assert!(transport.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_timeout_is_transport_timeout() {
        let transport = Arc::new(MockTransport::new());
        let manager = ConnectionManager::new(
            transport.clone(),
            ConnectionSettings::new("joe", "secret")
                .with_response_timeout(Some(Duration::from_millis(500))),
        );
        manager.connect().await.expect("connects");
        transport.set_response_delay(Some(Duration::from_secs(5)));

        let err = manager.ping().await.unwrap_err();

        assert_eq!(err.error_code(), "communication.timeout");
        assert!(manager.is_alive());
    }

    #[test]
    fn test_settings_debug_hides_password() {
        let settings = ConnectionSettings::new("joe", "topsecret");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("topsecret"));
        assert!(settings.redacted_connect_qos().contains("<passwd>***</passwd>"));
    }

    #[test]
    fn test_callback_session_id_generated_when_missing() {
        let transport = Arc::new(MockTransport::new());
        let manager = ConnectionManager::new(
            transport,
            ConnectionSettings::new("joe", "secret")
                .with_callback(CallbackAddress::new("http://localhost:8081")),
        );

        let cb_session_id = manager.callback_session_id().expect("generated");
        assert!(Uuid::parse_str(cb_session_id).is_ok());
    }
}
