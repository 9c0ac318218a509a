//! The (key, content, qos) triple exchanged for publish, get and update

use crate::codec::key::Key;
use crate::codec::qos::MsgQos;
use crate::error::ClientResult;
use bytes::Bytes;

/// Message unit as carried by the transport: documents still encoded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMsgUnit {
    pub key: String,
    pub content: Bytes,
    pub qos: String,
}

impl RawMsgUnit {
    pub fn new<K: Into<String>, Q: Into<String>>(key: K, content: Bytes, qos: Q) -> Self {
        Self {
            key: key.into(),
            content,
            qos: qos.into(),
        }
    }
}

/// Decoded message unit; immutable once built
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MsgUnit {
    key: Key,
    content: Bytes,
    qos: MsgQos,
}

impl MsgUnit {
    pub fn new(key: Key, content: impl Into<Bytes>, qos: MsgQos) -> Self {
        Self {
            key,
            content: content.into(),
            qos,
        }
    }

    /// Decode key and QoS documents
    pub fn decode(key: &str, content: Bytes, qos: &str) -> ClientResult<Self> {
        Ok(Self {
            key: Key::decode(key)?,
            content,
            qos: MsgQos::parse(qos)?,
        })
    }

    pub fn from_raw(raw: RawMsgUnit) -> ClientResult<Self> {
        Self::decode(&raw.key, raw.content, &raw.qos)
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Content interpreted as UTF-8, invalid sequences replaced
    pub fn content_str(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }

    pub fn qos(&self) -> &MsgQos {
        &self.qos
    }

    pub fn key_oid(&self) -> &str {
        self.key.oid()
    }

    pub fn to_raw(&self) -> RawMsgUnit {
        RawMsgUnit {
            key: self.key.to_xml(),
            content: self.content.clone(),
            qos: self.qos.to_xml(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_defaults_to_empty() {
        let msg = MsgUnit::default();
        assert!(msg.content().is_empty());
        assert_eq!(msg.key_oid(), "");
    }

    #[test]
    fn test_decode_and_to_raw() {
        let msg = MsgUnit::decode(
            "<key oid='HelloWorld'/>",
            Bytes::from_static(b"Hi"),
            "<qos><priority>8</priority></qos>",
        )
        .expect("decodes");

        assert_eq!(msg.key_oid(), "HelloWorld");
        assert_eq!(msg.content_str(), "Hi");
        assert_eq!(msg.qos().priority(), 8);

        let raw = msg.to_raw();
        assert_eq!(raw.key, "<key oid='HelloWorld'/>");
        assert_eq!(raw.qos, "<qos><priority>8</priority></qos>");
    }

    #[test]
    fn test_decode_rejects_bad_key() {
        assert!(MsgUnit::decode("<qos/>", Bytes::new(), "").is_err());
    }
}
