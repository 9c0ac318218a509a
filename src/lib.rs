//! Failsafe xmlBlaster client connection layer
//!
//! Establishes a session with a publish/subscribe server, keeps it alive
//! across network outages and exchanges the protocol's XML QoS/Key documents.
//!
//! # Overview
//!
//! - [`codec`]: pure encoding and decoding of keys, QoS documents, client
//!   properties, session names and the connect handshake
//! - [`connection`]: the [`ConnectionManager`] state machine
//!   (UNDEF/ALIVE/POLLING/DEAD) with its heartbeat and reconnect loops
//! - [`callback`]: routes server-pushed updates to user handlers
//! - [`transport`]: the trait the byte channel to the server implements
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use xmlblaster_client::testing::MockTransport;
//! use xmlblaster_client::{ConnectionManager, ConnectionSettings, Key, MsgUnit};
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(MockTransport::new());
//! let connection = ConnectionManager::new(transport, ConnectionSettings::new("joe", "secret"));
//!
//! connection.connect().await.unwrap();
//! let msg = MsgUnit::new(Key::exact("news").unwrap(), "hello", Default::default());
//! let reply = connection.publish(&msg).await.unwrap();
//! assert_eq!(reply.key_oid(), "news");
//!
//! connection.disconnect(None).await.unwrap();
//! assert!(connection.is_consumed());
//! # });
//! ```

pub mod callback;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod observability;
pub mod session;
pub mod testing;
pub mod transport;

pub use callback::{CallbackDispatcher, UpdateHandler};
pub use codec::{
    CallbackAddress, ClientProperty, ConnectOptions, ConnectReturnQos, Key, MsgQos, MsgUnit,
    PublishReturnQos, Qos, QosBuilder, QueryType, RawMsgUnit, SessionName, StatusQos,
    SubscribeReturnQos, UpdateQos,
};
pub use config::{ClientConfig, ConfigError};
pub use connection::{
    ConnectionInfo, ConnectionManager, ConnectionSettings, ConnectionState,
    ConnectionStateListener, ServerHealth,
};
pub use error::{ClientError, ClientResult, ErrorCode};
pub use session::SessionDescriptor;
pub use transport::{Transport, TransportError};
