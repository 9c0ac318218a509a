//! Message and subscription keys
//!
//! An exact key addresses a single topic by its oid. Query keys (XPATH,
//! DOMAIN, REGEX) carry an expression instead and leave the oid empty.

use crate::codec::escape::{escape_attr, escape_text};
use crate::codec::node::XmlDocument;
use crate::error::{ClientError, ClientResult};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
    #[default]
    Exact,
    Xpath,
    Domain,
    Regex,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Exact => "EXACT",
            QueryType::Xpath => "XPATH",
            QueryType::Domain => "DOMAIN",
            QueryType::Regex => "REGEX",
        }
    }

    /// Parse the `queryType` attribute; missing means EXACT
    pub fn parse(value: &str) -> ClientResult<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "EXACT" => Ok(QueryType::Exact),
            "XPATH" => Ok(QueryType::Xpath),
            "DOMAIN" => Ok(QueryType::Domain),
            "REGEX" => Ok(QueryType::Regex),
            other => Err(ClientError::malformed(format!(
                "unknown key queryType '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed or constructed `<key>` document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Key {
    oid: String,
    query_type: QueryType,
    query: String,
    domain: String,
    content_mime: String,
    content_mime_extended: String,
    client_tags: String,
}

impl Key {
    /// Key addressing one topic
    pub fn exact<S: Into<String>>(oid: S) -> ClientResult<Self> {
        let oid = oid.into();
        if oid.trim().is_empty() {
            return Err(ClientError::illegal_argument(
                "an EXACT key needs a non-empty oid",
            ));
        }
        Ok(Self {
            oid,
            ..Self::default()
        })
    }

    /// Query key; the oid stays empty
    pub fn query<S: Into<String>>(query_type: QueryType, expression: S) -> ClientResult<Self> {
        if query_type == QueryType::Exact {
            return Err(ClientError::illegal_argument(
                "use Key::exact for EXACT keys",
            ));
        }
        Ok(Self {
            query_type,
            query: expression.into(),
            ..Self::default()
        })
    }

    pub fn xpath<S: Into<String>>(expression: S) -> ClientResult<Self> {
        Self::query(QueryType::Xpath, expression)
    }

    pub fn with_domain<S: Into<String>>(mut self, domain: S) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_content_mime<S: Into<String>>(mut self, mime: S) -> Self {
        self.content_mime = mime.into();
        self
    }

    pub fn with_content_mime_extended<S: Into<String>>(mut self, mime: S) -> Self {
        self.content_mime_extended = mime.into();
        self
    }

    /// Application tags written as children of `<key>`; must be well-formed markup
    pub fn with_client_tags<S: Into<String>>(mut self, tags: S) -> Self {
        self.client_tags = tags.into();
        self
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// The query expression; empty for EXACT keys
    pub fn query_expression(&self) -> &str {
        &self.query
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn content_mime(&self) -> &str {
        &self.content_mime
    }

    pub fn content_mime_extended(&self) -> &str {
        &self.content_mime_extended
    }

    pub fn client_tags(&self) -> &str {
        &self.client_tags
    }

    pub fn is_exact(&self) -> bool {
        self.query_type == QueryType::Exact
    }

    /// Encode as a `<key>` document
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<key oid='");
        out.push_str(&escape_attr(&self.oid));
        out.push('\'');
        if !self.is_exact() {
            out.push_str(" queryType='");
            out.push_str(self.query_type.as_str());
            out.push('\'');
        }
        for (name, value) in [
            ("domain", &self.domain),
            ("contentMime", &self.content_mime),
            ("contentMimeExtended", &self.content_mime_extended),
        ] {
            if !value.is_empty() {
                out.push(' ');
                out.push_str(name);
                out.push_str("='");
                out.push_str(&escape_attr(value));
                out.push('\'');
            }
        }

        if self.query.is_empty() && self.client_tags.is_empty() {
            out.push_str("/>");
            return out;
        }
        out.push('>');
        out.push_str(&escape_text(&self.query));
        out.push_str(&self.client_tags);
        out.push_str("</key>");
        out
    }

    /// Decode a `<key>` document; an empty document gives the empty key
    ///
    /// Query keys (XPATH, DOMAIN, REGEX) must leave `oid` empty.
    pub fn decode(xml: &str) -> ClientResult<Self> {
        let doc = XmlDocument::parse(xml)?;
        let Some(root) = doc.root() else {
            return Ok(Self::default());
        };
        if root.name() != "key" {
            return Err(ClientError::malformed(format!(
                "expected <key> root, found <{}>",
                root.name()
            )));
        }

        let query_type = QueryType::parse(root.attribute("queryType").unwrap_or(""))?;
        let oid = root.attribute("oid").unwrap_or_default();
        if query_type != QueryType::Exact && !oid.is_empty() {
            return Err(ClientError::malformed(format!(
                "{} query key must not carry oid '{oid}'",
                query_type.as_str()
            )));
        }
        let client_tags = root.child_elements().map(|el| el.to_xml()).collect();

        Ok(Self {
            oid: oid.to_string(),
            query_type,
            query: root.text().trim().to_string(),
            domain: root.attribute("domain").unwrap_or_default().to_string(),
            content_mime: root.attribute("contentMime").unwrap_or_default().to_string(),
            content_mime_extended: root
                .attribute("contentMimeExtended")
                .unwrap_or_default()
                .to_string(),
            client_tags,
        })
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_key_encoding() {
        let key = Key::exact("Hello").expect("valid oid");
        assert_eq!(key.to_xml(), "<key oid='Hello'/>");
    }

    #[test]
    fn test_exact_key_requires_oid() {
        assert!(Key::exact("").is_err());
        assert!(Key::query(QueryType::Exact, "x").is_err());
    }

    #[test]
    fn test_xpath_key_encoding() {
        let key = Key::xpath("//key[@oid='a']").expect("valid query");
        assert_eq!(
            key.to_xml(),
            "<key oid='' queryType='XPATH'>//key[@oid=&apos;a&apos;]</key>"
        );
        assert_eq!(key.oid(), "");
    }

    #[test]
    fn test_decode_full_key() {
        let key = Key::decode(
            "<key oid='radar' contentMime='text/xml' domain='RUGBY'><AGENT id='192'/></key>",
        )
        .expect("decodes");
        assert_eq!(key.oid(), "radar");
        assert_eq!(key.query_type(), QueryType::Exact);
        assert_eq!(key.domain(), "RUGBY");
        assert_eq!(key.content_mime(), "text/xml");
        assert_eq!(key.client_tags(), "<AGENT id='192'/>");
    }

    #[test]
    fn test_decode_query_key() {
        let key = Key::decode("<key oid='' queryType='xpath'>\n  //key\n</key>").expect("decodes");
        assert_eq!(key.query_type(), QueryType::Xpath);
        assert_eq!(key.query_expression(), "//key");
    }

    #[test]
    fn test_decode_query_key_with_domain() {
        let key = Key::decode("<key oid='' queryType='XPATH' domain='some'>//key[@oid='x']</key>")
            .expect("decodes");

        assert_eq!(key.oid(), "");
        assert_eq!(key.query_type(), QueryType::Xpath);
        assert_eq!(key.domain(), "some");
        assert_eq!(key.query_expression(), "//key[@oid='x']");
    }

    #[test]
    fn test_decode_rejects_query_key_with_oid() {
        let err = Key::decode("<key oid='abc' queryType='XPATH'>//x</key>").unwrap_err();
        assert!(matches!(err, ClientError::MalformedProtocolData { .. }));
    }

    #[test]
    fn test_decode_empty_document() {
        let key = Key::decode("").expect("empty is allowed");
        assert_eq!(key, Key::default());
        assert!(key.is_exact());
        assert_eq!(key.oid(), "");
    }

    #[test]
    fn test_decode_rejects_wrong_root_and_query_type() {
        assert!(matches!(
            Key::decode("<qos/>"),
            Err(ClientError::MalformedProtocolData { .. })
        ));
        assert!(matches!(
            Key::decode("<key oid='' queryType='SQL'>x</key>"),
            Err(ClientError::MalformedProtocolData { .. })
        ));
    }

    #[test]
    fn test_round_trip_with_attributes() {
        let key = Key::exact("a<b")
            .expect("valid")
            .with_domain("sport")
            .with_content_mime("text/plain")
            .with_client_tags("<tag>1</tag>");
        let decoded = Key::decode(&key.to_xml()).expect("decodes");
        assert_eq!(decoded, key);
    }
}
