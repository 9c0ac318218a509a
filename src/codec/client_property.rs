//! Typed `<clientProperty>` entries carried inside QoS documents

use crate::codec::escape::{escape_attr, escape_text, protection_needed, Protection};
use crate::codec::node::{parse_bool, Element, Node};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

pub const ENCODING_BASE64: &str = "base64";
pub const ENCODING_FORCE_PLAIN: &str = "forcePlain";
pub const ENCODING_QUOTED_PRINTABLE: &str = "quoted-printable";

pub const TYPE_STRING: &str = "string";
pub const TYPE_BLOB: &str = "byte[]";
pub const TYPE_BOOLEAN: &str = "boolean";
pub const TYPE_BYTE: &str = "byte";
pub const TYPE_DOUBLE: &str = "double";
pub const TYPE_FLOAT: &str = "float";
pub const TYPE_INT: &str = "int";
pub const TYPE_SHORT: &str = "short";
pub const TYPE_LONG: &str = "long";
pub const TYPE_NULL: &str = "null";

/// One named, optionally typed and encoded property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientProperty {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
    encoding: String,
    charset: String,
    value: String,
}

impl ClientProperty {
    /// Plain string property
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::typed(name, "", value)
    }

    /// Property with an explicit type such as `int` or `boolean`
    pub fn typed<N: Into<String>, T: Into<String>, V: Into<String>>(
        name: N,
        type_name: T,
        value: V,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            encoding: String::new(),
            charset: String::new(),
            value: value.into(),
        }
    }

    /// Binary property, always transmitted base64 encoded
    pub fn blob<N: Into<String>>(name: N, bytes: &[u8]) -> Self {
        Self {
            name: name.into(),
            type_name: TYPE_BLOB.to_string(),
            encoding: ENCODING_BASE64.to_string(),
            charset: String::new(),
            value: BASE64.encode(bytes),
        }
    }

    pub(crate) fn from_element(el: &Element) -> Option<Self> {
        let name = el.attribute("name")?;
        let value = match el.children().first() {
            Some(Node::Text(t)) | Some(Node::Cdata(t)) => t.clone(),
            _ => String::new(),
        };
        Some(Self {
            name: name.to_string(),
            type_name: el.attribute("type").unwrap_or_default().to_string(),
            encoding: el.attribute("encoding").unwrap_or_default().to_string(),
            charset: el.attribute("charset").unwrap_or_default().to_string(),
            value,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type, `string` when none was given
    pub fn type_name(&self) -> &str {
        if self.type_name.is_empty() {
            TYPE_STRING
        } else {
            &self.type_name
        }
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn with_charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.charset = charset.into();
        self
    }

    pub fn is_base64(&self) -> bool {
        self.encoding.eq_ignore_ascii_case(ENCODING_BASE64)
    }

    /// The value as transmitted, before any decoding
    pub fn raw_value(&self) -> &str {
        &self.value
    }

    /// Decoded bytes; a base64 value that does not decode gives no bytes
    pub fn blob_value(&self) -> Vec<u8> {
        if self.is_base64() {
            let compact: String = self.value.split_whitespace().collect();
            BASE64.decode(compact).unwrap_or_default()
        } else {
            self.value.as_bytes().to_vec()
        }
    }

    /// Readable value, base64 content decoded with the declared charset
    pub fn string_value(&self) -> String {
        if !self.is_base64() {
            return self.value.clone();
        }
        decode_charset(&self.blob_value(), &self.charset)
    }

    pub fn int_value(&self) -> Option<i32> {
        self.string_value().trim().parse().ok()
    }

    pub fn long_value(&self) -> Option<i64> {
        self.string_value().trim().parse().ok()
    }

    pub fn float_value(&self) -> Option<f32> {
        self.string_value().trim().parse().ok()
    }

    pub fn double_value(&self) -> Option<f64> {
        self.string_value().trim().parse().ok()
    }

    pub fn bool_value(&self) -> Option<bool> {
        parse_bool(&self.string_value())
    }

    /// Encode as a `<clientProperty>` element
    pub fn to_xml(&self) -> String {
        let mut out = format!("<clientProperty name='{}'", escape_attr(&self.name));
        if !self.type_name.is_empty() && self.type_name != TYPE_STRING {
            out.push_str(&format!(" type='{}'", escape_attr(&self.type_name)));
        }

        let (encoding, value) = match protection_needed(&self.value) {
            Protection::Base64 if !self.is_base64() => {
                (ENCODING_BASE64.to_string(), BASE64.encode(self.value.as_bytes()))
            }
            _ => (self.encoding.clone(), self.value.clone()),
        };
        if !encoding.is_empty() {
            out.push_str(&format!(" encoding='{}'", escape_attr(&encoding)));
        }
        if !self.charset.is_empty() {
            out.push_str(&format!(" charset='{}'", escape_attr(&self.charset)));
        }

        match protection_needed(&value) {
            Protection::Cdata => out.push_str(&format!("><![CDATA[{value}]]></clientProperty>")),
            _ if value.is_empty() => out.push_str("/>"),
            _ => out.push_str(&format!(">{}</clientProperty>", escape_text(&value))),
        }
        out
    }
}

/// Decode bytes in the named charset; unknown charsets fall back to lossy UTF-8
fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "latin-1" | "iso8859-1" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        "utf-16le" | "utf-16" | "unicode" => {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
