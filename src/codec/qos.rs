//! QoS documents and their typed views
//!
//! [`Qos`] is the generic document plus its client properties. [`MsgQos`]
//! describes a delivered or published message, [`StatusQos`] the return value
//! of subscribe, unsubscribe, erase and publish. Every accessor falls back to a
//! documented default when the document does not carry the value.

use crate::codec::client_property::ClientProperty;
use crate::codec::escape::escape_text;
use crate::codec::node::XmlDocument;
use crate::codec::session_name::SessionName;
use crate::error::{ClientError, ClientResult};
use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

pub const STATE_OK: &str = "OK";
pub const STATE_WARNING: &str = "WARNING";
pub const STATE_TIMEOUT: &str = "TIMEOUT";
pub const STATE_EXPIRED: &str = "EXPIRED";
pub const STATE_ERASED: &str = "ERASED";
pub const STATE_FORWARD_ERROR: &str = "FORWARD_ERROR";
pub const INFO_QUEUED: &str = "QUEUED";

pub const DEFAULT_PRIORITY: i32 = 5;

/// Acknowledgement returned for a successfully processed update or ping
pub const ACK_OK_QOS: &str = "<qos><state id='OK'/></qos>";
pub const DEFAULT_SUBSCRIBE_QOS: &str = "<qos><local>false</local></qos>";
pub const DEFAULT_GET_QOS: &str = "<qos><content>true</content></qos>";
pub const DEFAULT_ERASE_QOS: &str =
    "<qos><erase forceDestroy='false'><history numEntries='-1'/></erase></qos>";
pub const DEFAULT_DISCONNECT_QOS: &str =
    "<qos><deleteSubjectQueue>true</deleteSubjectQueue><clearSessions>true</clearSessions></qos>";

/// Generic `<qos>` document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Qos {
    doc: XmlDocument,
    client_properties: Vec<ClientProperty>,
}

impl Qos {
    /// Parse a `<qos>` document; an empty input gives an empty QoS
    pub fn parse(xml: &str) -> ClientResult<Self> {
        let doc = XmlDocument::parse(xml)?;
        if let Some(root) = doc.root() {
            if root.name() != "qos" {
                return Err(ClientError::malformed(format!(
                    "expected <qos> root, found <{}>",
                    root.name()
                )));
            }
        }

        let client_properties = doc
            .root()
            .into_iter()
            .flat_map(|root| root.child_elements())
            .filter(|el| el.name() == "clientProperty")
            .filter_map(|el| {
                let prop = ClientProperty::from_element(el);
                if prop.is_none() {
                    warn!("Ignoring qos clientProperty without name attribute");
                }
                prop
            })
            .collect();

        Ok(Self {
            doc,
            client_properties,
        })
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn get_xpath_opt(&self, path: &str) -> Option<String> {
        self.doc.get_xpath_opt(path)
    }

    pub fn get_xpath(&self, path: &str, default: &str) -> String {
        self.doc.get_xpath(path, default)
    }

    pub fn get_xpath_i32(&self, path: &str, default: i32) -> i32 {
        self.doc.get_xpath_i32(path, default)
    }

    pub fn get_xpath_i64(&self, path: &str, default: i64) -> i64 {
        self.doc.get_xpath_i64(path, default)
    }

    pub fn get_xpath_bool(&self, path: &str, default: bool) -> bool {
        self.doc.get_xpath_bool(path, default)
    }

    pub fn client_properties(&self) -> &[ClientProperty] {
        &self.client_properties
    }

    pub fn client_property(&self, name: &str) -> Option<&ClientProperty> {
        self.client_properties.iter().find(|p| p.name() == name)
    }

    pub fn client_property_str(&self, name: &str, default: &str) -> String {
        self.client_property(name)
            .map(ClientProperty::string_value)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn client_property_i32(&self, name: &str, default: i32) -> i32 {
        self.client_property(name)
            .and_then(ClientProperty::int_value)
            .unwrap_or(default)
    }

    pub fn client_property_i64(&self, name: &str, default: i64) -> i64 {
        self.client_property(name)
            .and_then(ClientProperty::long_value)
            .unwrap_or(default)
    }

    pub fn client_property_f32(&self, name: &str, default: f32) -> f32 {
        self.client_property(name)
            .and_then(ClientProperty::float_value)
            .unwrap_or(default)
    }

    pub fn client_property_f64(&self, name: &str, default: f64) -> f64 {
        self.client_property(name)
            .and_then(ClientProperty::double_value)
            .unwrap_or(default)
    }

    pub fn client_property_bool(&self, name: &str, default: bool) -> bool {
        self.client_property(name)
            .and_then(ClientProperty::bool_value)
            .unwrap_or(default)
    }

    pub fn client_property_blob(&self, name: &str, default: &[u8]) -> Vec<u8> {
        self.client_property(name)
            .map(ClientProperty::blob_value)
            .unwrap_or_else(|| default.to_vec())
    }

    /// Markup of the parsed document, `<qos/>` when empty
    pub fn to_xml(&self) -> String {
        if self.doc.is_empty() {
            "<qos/>".to_string()
        } else {
            self.doc.to_xml()
        }
    }

    fn state(&self) -> String {
        self.get_xpath("/qos/state/@id", STATE_OK)
    }

    fn state_info(&self) -> String {
        self.get_xpath("/qos/state/@info", "")
    }

    fn rcv_timestamp_nanos(&self) -> i64 {
        self.get_xpath_i64("/qos/rcvTimestamp/@nanos", -1)
    }

    fn rcv_time(&self) -> String {
        self.get_xpath("/qos/rcvTimestamp/text()", "").trim().to_string()
    }

    fn rcv_timestamp(&self) -> Option<DateTime<Utc>> {
        let nanos = self.rcv_timestamp_nanos();
        (nanos >= 0).then(|| Utc.timestamp_nanos(nanos))
    }
}

/// QoS of a published or delivered message; also used for update callbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MsgQos {
    qos: Qos,
}

pub type UpdateQos = MsgQos;

impl MsgQos {
    pub fn parse(xml: &str) -> ClientResult<Self> {
        Ok(Self {
            qos: Qos::parse(xml)?,
        })
    }

    pub fn qos(&self) -> &Qos {
        &self.qos
    }

    pub fn state(&self) -> String {
        self.qos.state()
    }

    pub fn state_info(&self) -> String {
        self.qos.state_info()
    }

    pub fn is_ok(&self) -> bool {
        self.state() == STATE_OK
    }

    pub fn is_erased(&self) -> bool {
        self.state() == STATE_ERASED
    }

    pub fn is_expired(&self) -> bool {
        self.state() == STATE_EXPIRED
    }

    /// Point-to-point messages name an explicit destination
    pub fn is_ptp(&self) -> bool {
        !self.qos.doc.select("/qos/destination").is_empty()
    }

    /// `<persistent/>` and `<persistent>true</persistent>` both count
    pub fn is_persistent(&self) -> bool {
        self.qos.get_xpath_bool("/qos/persistent", false)
    }

    pub fn priority(&self) -> i32 {
        self.qos
            .get_xpath_i32("/qos/priority/text()", DEFAULT_PRIORITY)
    }

    pub fn queue_index(&self) -> i64 {
        self.qos.get_xpath_i64("/qos/queue/@index", 0)
    }

    pub fn queue_size(&self) -> i64 {
        self.qos.get_xpath_i64("/qos/queue/@size", 0)
    }

    pub fn redeliver(&self) -> i32 {
        self.qos.get_xpath_i32("/qos/redeliver/text()", 0)
    }

    /// Sender session; `None` when absent or not a valid session name
    pub fn sender(&self) -> Option<SessionName> {
        let sender = self.qos.get_xpath_opt("/qos/sender/text()")?;
        SessionName::parse(&sender).ok()
    }

    pub fn subscription_id(&self) -> String {
        self.qos.get_xpath("/qos/subscribe/@id", "")
    }

    /// Milliseconds to live, -1 for forever
    pub fn life_time(&self) -> i64 {
        self.qos.get_xpath_i64("/qos/expiration/@lifeTime", -1)
    }

    pub fn rcv_timestamp_nanos(&self) -> i64 {
        self.qos.rcv_timestamp_nanos()
    }

    pub fn rcv_time(&self) -> String {
        self.qos.rcv_time()
    }

    pub fn rcv_timestamp(&self) -> Option<DateTime<Utc>> {
        self.qos.rcv_timestamp()
    }

    pub fn client_property(&self, name: &str) -> Option<&ClientProperty> {
        self.qos.client_property(name)
    }

    pub fn client_properties(&self) -> &[ClientProperty] {
        self.qos.client_properties()
    }

    pub fn to_xml(&self) -> String {
        self.qos.to_xml()
    }
}

/// Status returned by subscribe, unsubscribe, erase and publish
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusQos {
    qos: Qos,
}

pub type SubscribeReturnQos = StatusQos;
pub type UnSubscribeReturnQos = StatusQos;
pub type EraseReturnQos = StatusQos;
pub type PublishReturnQos = StatusQos;

impl StatusQos {
    pub fn parse(xml: &str) -> ClientResult<Self> {
        Ok(Self {
            qos: Qos::parse(xml)?,
        })
    }

    pub fn qos(&self) -> &Qos {
        &self.qos
    }

    pub fn state(&self) -> String {
        self.qos.state()
    }

    pub fn state_info(&self) -> String {
        self.qos.state_info()
    }

    pub fn is_ok(&self) -> bool {
        self.state() == STATE_OK
    }

    /// Id the server assigned to a new subscription
    pub fn subscription_id(&self) -> String {
        self.qos.get_xpath("/qos/subscribe/@id", "")
    }

    /// Oid of the topic a publish landed on
    pub fn key_oid(&self) -> String {
        self.qos.get_xpath("/qos/key/@oid", "")
    }

    pub fn rcv_timestamp_nanos(&self) -> i64 {
        self.qos.rcv_timestamp_nanos()
    }

    pub fn rcv_time(&self) -> String {
        self.qos.rcv_time()
    }

    pub fn to_xml(&self) -> String {
        self.qos.to_xml()
    }
}

/// Builds QoS documents for publish and subscribe calls
#[derive(Debug, Clone, Default)]
pub struct QosBuilder {
    priority: Option<i32>,
    persistent: Option<bool>,
    life_time: Option<i64>,
    destination: Option<String>,
    local: Option<bool>,
    client_properties: Vec<ClientProperty>,
}

impl QosBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn life_time(mut self, millis: i64) -> Self {
        self.life_time = Some(millis);
        self
    }

    /// Address a single session or login instead of the subscribers
    pub fn destination<S: Into<String>>(mut self, destination: S) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Whether a subscriber also receives its own publishes
    pub fn local(mut self, local: bool) -> Self {
        self.local = Some(local);
        self
    }

    pub fn client_property(mut self, property: ClientProperty) -> Self {
        self.client_properties.push(property);
        self
    }

    pub fn to_xml(&self) -> String {
        let mut body = String::new();
        if let Some(priority) = self.priority {
            body.push_str(&format!("<priority>{priority}</priority>"));
        }
        match self.persistent {
            Some(true) => body.push_str("<persistent/>"),
            Some(false) => body.push_str("<persistent>false</persistent>"),
            None => {}
        }
        if let Some(life_time) = self.life_time {
            body.push_str(&format!("<expiration lifeTime='{life_time}'/>"));
        }
        if let Some(destination) = &self.destination {
            body.push_str(&format!(
                "<destination>{}</destination>",
                escape_text(destination)
            ));
        }
        if let Some(local) = self.local {
            body.push_str(&format!("<local>{local}</local>"));
        }
        for prop in &self.client_properties {
            body.push_str(&prop.to_xml());
        }

        if body.is_empty() {
            "<qos/>".to_string()
        } else {
            format!("<qos>{body}</qos>")
        }
    }

    pub fn build(&self) -> ClientResult<MsgQos> {
        MsgQos::parse(&self.to_xml())
    }
}
