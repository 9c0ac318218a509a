//! Character escaping for QoS and Key documents
//!
//! Element text and attribute values use slightly different tables: attribute
//! values leave `>` alone. [`unescape`] undoes both, and also resolves numeric
//! character references written by other peers.

/// Escape a value for use as element text
pub fn escape_text(text: &str) -> String {
    escape_with(text, true)
}

/// Escape a value for use inside a quoted attribute
pub fn escape_attr(text: &str) -> String {
    escape_with(text, false)
}

fn escape_with(text: &str, escape_gt: bool) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\0' => out.push_str("&#x0;"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' if escape_gt => out.push_str("&gt;"),
            '\r' => out.push_str("&#x0D;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Resolve entity and character references
///
/// Unknown or malformed references are kept verbatim.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match candidate.find(';').and_then(|end| {
            resolve_reference(&candidate[1..end]).map(|resolved| (resolved, end))
        }) {
            Some((resolved, end)) => {
                out.push(resolved);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// How a value must be wrapped to survive inside an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    None,
    Cdata,
    Base64,
}

/// Decide whether a value can be written plainly, as CDATA, or only as base64
pub fn protection_needed(text: &str) -> Protection {
    if text.contains("]]>") {
        Protection::Base64
    } else if text.contains('<') || text.contains('&') {
        Protection::Cdata
    } else {
        Protection::None
    }
}
