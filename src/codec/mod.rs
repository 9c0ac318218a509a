//! Wire codec for the XML QoS/Key protocol
//!
//! Pure functions and value types only; nothing here performs I/O.

pub mod client_property;
pub mod connect;
pub mod escape;
pub mod key;
pub mod msg_unit;
pub mod node;
pub mod qos;
pub mod session_name;

pub use client_property::ClientProperty;
pub use connect::{
    decode_connect_result, encode_connect_qos, CallbackAddress, ConnectOptions, ConnectReturnQos,
};
pub use key::{Key, QueryType};
pub use msg_unit::{MsgUnit, RawMsgUnit};
pub use node::XmlDocument;
pub use qos::{
    EraseReturnQos, MsgQos, PublishReturnQos, Qos, QosBuilder, StatusQos, SubscribeReturnQos,
    UnSubscribeReturnQos, UpdateQos,
};
pub use session_name::SessionName;
