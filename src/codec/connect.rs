//! Connect request and reply documents

use crate::codec::escape::{escape_attr, escape_text};
use crate::codec::qos::Qos;
use crate::codec::session_name::SessionName;
use crate::error::{ClientError, ClientResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

static ATTRIBUTE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("attribute name pattern is a valid regex")
});

/// Attributes the encoder writes itself
const RESERVED_ATTRIBUTES: [&str; 2] = ["type", "sessionId"];

pub const DEFAULT_PING_INTERVAL_MS: i64 = 5000;
pub const DEFAULT_RETRIES: i64 = -1;
pub const DEFAULT_DELAY_MS: i64 = 5000;
pub const DEFAULT_CALLBACK_TYPE: &str = "XMLRPC";

/// Options written onto the `<callback>` element of a connect request
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    ping_interval: i64,
    retries: i64,
    delay: i64,
    extra: BTreeMap<String, String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL_MS,
            retries: DEFAULT_RETRIES,
            delay: DEFAULT_DELAY_MS,
            extra: BTreeMap::new(),
        }
    }
}

impl ConnectOptions {
    /// Build from a flat option map; unknown keys are kept as extra attributes
    pub fn from_map<'a, I>(options: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut result = Self::default();
        for (key, value) in options {
            result = result.with_option(key, value);
        }
        result
    }

    /// Set one option by its wire name
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        match key {
            "pingInterval" => match value.trim().parse::<i64>() {
                Ok(v) => self = self.with_ping_interval(v),
                Err(_) => debug!(value, "Ignoring non-numeric pingInterval option"),
            },
            "retries" => match value.trim().parse::<i64>() {
                Ok(v) => self.retries = v,
                Err(_) => debug!(value, "Ignoring non-numeric retries option"),
            },
            "delay" => match value.trim().parse::<i64>() {
                Ok(v) => self.delay = v.max(0),
                Err(_) => debug!(value, "Ignoring non-numeric delay option"),
            },
            _ if !ATTRIBUTE_NAME.is_match(key) || RESERVED_ATTRIBUTES.contains(&key) => {
                warn!(option = key, "Ignoring connect option that is not a usable attribute name");
            }
            _ => {
                self.extra.insert(key.to_string(), value.to_string());
            }
        }
        self
    }

    /// Negative values are floored to 0, which disables pinging
    pub fn with_ping_interval(mut self, millis: i64) -> Self {
        self.ping_interval = millis.max(0);
        self
    }

    pub fn with_retries(mut self, retries: i64) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, millis: i64) -> Self {
        self.delay = millis.max(0);
        self
    }

    pub fn ping_interval(&self) -> i64 {
        self.ping_interval
    }

    pub fn retries(&self) -> i64 {
        self.retries
    }

    pub fn delay(&self) -> i64 {
        self.delay
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }
}

/// Where and how the server delivers updates to this client
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackAddress {
    pub address: String,
    pub protocol: String,
    /// Secret the server presents with every update
    pub session_id: Option<String>,
}

impl CallbackAddress {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            protocol: DEFAULT_CALLBACK_TYPE.to_string(),
            session_id: None,
        }
    }
}

/// Encode the connect request
pub fn encode_connect_qos(
    user: &str,
    password: &str,
    callback: Option<&CallbackAddress>,
    options: &ConnectOptions,
) -> String {
    let mut out = String::from("<qos>\n");
    out.push_str(" <securityService type='htpasswd' version='1.0'>\n");
    out.push_str(&format!("  <user>{}</user>\n", escape_text(user)));
    out.push_str(&format!("  <passwd>{}</passwd>\n", escape_text(password)));
    out.push_str(" </securityService>\n");

    if let Some(callback) = callback {
        out.push_str(&format!(
            " <callback type='{}'",
            escape_attr(&callback.protocol)
        ));
        if let Some(session_id) = &callback.session_id {
            out.push_str(&format!(" sessionId='{}'", escape_attr(session_id)));
        }
        out.push_str(&format!(
            " pingInterval='{}' retries='{}' delay='{}'",
            options.ping_interval, options.retries, options.delay
        ));
        for (key, value) in &options.extra {
            out.push_str(&format!(" {key}='{}'", escape_attr(value)));
        }
        out.push_str(&format!(">{}</callback>\n", escape_text(&callback.address)));
    }

    out.push_str("</qos>");
    out
}

/// Server reply to a connect request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectReturnQos {
    qos: Qos,
}

/// Decode the connect reply; it must carry the secret session id
pub fn decode_connect_result(xml: &str) -> ClientResult<ConnectReturnQos> {
    let reply = ConnectReturnQos {
        qos: Qos::parse(xml)?,
    };
    if reply.secret_session_id().trim().is_empty() {
        return Err(ClientError::protocol(
            "connect reply carries no session id",
        ));
    }
    Ok(reply)
}

fn extract_tag(markup: &str, tag: &str) -> String {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    markup
        .find(&open)
        .map(|start| start + open.len())
        .and_then(|start| {
            markup[start..]
                .find(&close)
                .map(|end| markup[start..start + end].trim().to_string())
        })
        .unwrap_or_default()
}

impl ConnectReturnQos {
    pub fn qos(&self) -> &Qos {
        &self.qos
    }

    /// Login name echoed in the security section; may sit inside CDATA
    pub fn security_service_user(&self) -> String {
        extract_tag(&self.qos.get_xpath("/qos/securityService", ""), "user")
    }

    pub fn security_service_passwd(&self) -> String {
        extract_tag(&self.qos.get_xpath("/qos/securityService", ""), "passwd")
    }

    pub fn session_name(&self) -> Option<SessionName> {
        let name = self.qos.get_xpath("/qos/session/@name", "");
        if name.is_empty() {
            return None;
        }
        SessionName::parse(&name).ok()
    }

    pub fn session_timeout(&self) -> i64 {
        self.qos.get_xpath_i64("/qos/session/@timeout", 3_600_000)
    }

    pub fn max_sessions(&self) -> i32 {
        self.qos.get_xpath_i32("/qos/session/@maxSessions", 10)
    }

    pub fn clear_sessions(&self) -> bool {
        self.qos.get_xpath_bool("/qos/session/@clearSessions", false)
    }

    pub fn reconnect_same_client_only(&self) -> bool {
        self.qos
            .get_xpath_bool("/qos/session/@reconnectSameClientOnly", false)
    }

    /// Secret session id; never log this
    pub fn secret_session_id(&self) -> String {
        self.qos.get_xpath("/qos/session/@sessionId", "")
    }

    pub fn is_ptp(&self) -> bool {
        self.qos.get_xpath_bool("/qos/ptp/text()", false)
    }

    pub fn is_reconnected(&self) -> bool {
        self.qos.get_xpath_bool("/qos/reconnected/text()", false)
    }

    pub fn is_persistent(&self) -> bool {
        self.qos.get_xpath_bool("/qos/persistent", false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::node::XmlDocument;

    #[test]
    fn test_encode_without_callback() {
        let xml = encode_connect_qos("joe", "secret", None, &ConnectOptions::default());
        let doc = XmlDocument::parse(&xml).expect("well formed");

        assert_eq!(doc.get_xpath("/qos/securityService/@type", ""), "htpasswd");
        assert_eq!(doc.get_xpath("/qos/securityService/user/text()", ""), "joe");
        assert_eq!(doc.get_xpath("/qos/securityService/passwd/text()", ""), "secret");
        assert!(doc.select("/qos/callback").is_empty());
    }

    #[test]
    fn test_unusable_option_names_are_dropped() {
        let options = ConnectOptions::default()
            .with_option("bad key", "1")
            .with_option("x='y'", "1")
            .with_option("a=b", "1")
            .with_option("sessionId", "forged")
            .with_option("burst.mode", "on");
        let callback = CallbackAddress::new("http://127.0.0.1:8080/RPC2");

        let xml = encode_connect_qos("joe", "secret", Some(&callback), &options);
        let doc = XmlDocument::parse(&xml).expect("well formed");

        assert_eq!(options.extra().len(), 1);
        assert_eq!(doc.get_xpath("/qos/callback/@burst.mode", ""), "on");
        assert_eq!(doc.get_xpath("/qos/callback/@sessionId", "none"), "none");
    }

    #[test]
    fn test_encode_with_callback_and_extra_options() {
        let mut map = BTreeMap::new();
        map.insert("pingInterval".to_string(), "-10".to_string());
        map.insert("useForSubjectQueue".to_string(), "true".to_string());
        let options = ConnectOptions::from_map(&map);
        let mut callback = CallbackAddress::new("http://127.0.0.1:8080/RPC2");
        callback.session_id = Some("cb-secret".to_string());

        let xml = encode_connect_qos("joe", "a<b", Some(&callback), &options);
        let doc = XmlDocument::parse(&xml).expect("well formed");

        assert_eq!(doc.get_xpath("/qos/callback/@type", ""), "XMLRPC");
        assert_eq!(doc.get_xpath("/qos/callback/@pingInterval", ""), "0");
        assert_eq!(doc.get_xpath("/qos/callback/@retries", ""), "-1");
        assert_eq!(doc.get_xpath("/qos/callback/@delay", ""), "5000");
        assert_eq!(doc.get_xpath("/qos/callback/@useForSubjectQueue", ""), "true");
        assert_eq!(doc.get_xpath("/qos/callback/@sessionId", ""), "cb-secret");
        assert_eq!(
            doc.get_xpath("/qos/callback/text()", ""),
            "http://127.0.0.1:8080/RPC2"
        );
        assert_eq!(doc.get_xpath("/qos/securityService/passwd/text()", ""), "a<b");
    }

    #[test]
    fn test_decode_connect_result() {
        let reply = decode_connect_result(
            "<qos>\
             <securityService type='htpasswd' version='1.0'><![CDATA[<user>joe</user><passwd>pw</passwd>]]></securityService>\
             <session name='/node/heron/client/joe/session/-2' timeout='86400000' maxSessions='20' \
              clearSessions='false' reconnectSameClientOnly='true' sessionId='sessionId:127.0.0.1-null-1'/>\
             <reconnected>true</reconnected>\
             </qos>",
        )
        .expect("valid reply");

        assert_eq!(reply.security_service_user(), "joe");
        assert_eq!(reply.security_service_passwd(), "pw");
        assert_eq!(reply.secret_session_id(), "sessionId:127.0.0.1-null-1");
        assert_eq!(reply.session_timeout(), 86_400_000);
        assert_eq!(reply.max_sessions(), 20);
        assert!(!reply.clear_sessions());
        assert!(reply.reconnect_same_client_only());
        assert!(reply.is_reconnected());
        assert!(!reply.is_ptp());
        let name = reply.session_name().expect("has session name");
        assert_eq!(name.public_session_id(), -2);
    }

    #[test]
    fn test_decode_connect_result_requires_session_id() {
        let result = decode_connect_result("<qos><session name='client/joe'/></qos>");
        assert!(matches!(result, Err(ClientError::Protocol { .. })));
    }

    #[test]
    fn test_connect_return_defaults() {
        let reply = decode_connect_result("<qos><session sessionId='x'/></qos>").expect("valid");
        assert_eq!(reply.session_timeout(), 3_600_000);
        assert_eq!(reply.max_sessions(), 10);
        assert!(reply.session_name().is_none());
        assert_eq!(reply.security_service_user(), "");
    }
}
