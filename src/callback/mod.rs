//! Inbound side: updates and pings the server sends to this client

pub mod dispatcher;

pub use dispatcher::{CallbackDispatcher, UpdateHandler};
