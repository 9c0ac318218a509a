//! Session names such as `/node/heron/client/joe/session/2`

use crate::error::{ClientError, ClientResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const ROOT_MARKER: &str = "node";
const SUBJECT_MARKER: &str = "client";
const SESSION_MARKER: &str = "session";

/// Address of a login and optionally one of its sessions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionName {
    node_id: Option<String>,
    login_name: String,
    public_session_id: i64,
}

impl SessionName {
    pub fn new<S: Into<String>>(login_name: S, public_session_id: i64) -> Self {
        Self {
            node_id: None,
            login_name: login_name.into(),
            public_session_id,
        }
    }

    /// Parse absolute (`/node/heron/client/joe/2`) or relative (`client/joe/2`, `joe`) names
    pub fn parse(name: &str) -> ClientResult<Self> {
        let name = name.trim();
        let malformed = |why: &str| ClientError::malformed(format!("'{name}': {why}"));

        let mut node_id = None;
        let relative: Vec<&str> = if name.starts_with('/') {
            let parts: Vec<&str> = name.split('/').filter(|p| !p.is_empty()).collect();
            if parts.first() != Some(&ROOT_MARKER) {
                return Err(malformed("the root tag must be '/node'"));
            }
            node_id = parts.get(1).map(|id| id.to_string());
            if parts.len() > 2 && parts[2] != SUBJECT_MARKER {
                return Err(malformed("'client' tag is missing"));
            }
            parts.into_iter().skip(3).collect()
        } else {
            name.split('/').collect()
        };

        let mut parts = relative.into_iter();
        let login_name = match parts.next() {
            Some(SUBJECT_MARKER) => parts.next(),
            other => other,
        }
        .filter(|login| !login.is_empty())
        .ok_or_else(|| malformed("no relative information found"))?;

        let public_session_id = match parts.next() {
            None => 0,
            Some(marker) => {
                let id = if marker == SESSION_MARKER {
                    parts.next().unwrap_or(marker)
                } else {
                    marker
                };
                id.parse::<i64>()
                    .map_err(|_| malformed("public session id is not a number"))?
            }
        };

        Ok(Self {
            node_id,
            login_name: login_name.to_string(),
            public_session_id,
        })
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn login_name(&self) -> &str {
        &self.login_name
    }

    pub fn public_session_id(&self) -> i64 {
        self.public_session_id
    }

    /// A name without public session id addresses the login, not a session
    pub fn is_session(&self) -> bool {
        self.public_session_id != 0
    }

    /// Ids below zero are assigned by the server
    pub fn is_pub_session_id_internal(&self) -> bool {
        self.public_session_id < 0
    }

    /// Ids above zero were chosen by the client
    pub fn is_pub_session_id_user(&self) -> bool {
        self.public_session_id > 0
    }

    /// e.g. `client/joe/session/2` or `client/joe`
    pub fn relative_name(&self) -> String {
        let mut name = format!("{SUBJECT_MARKER}/{}", self.login_name);
        if self.is_session() {
            name.push_str(&format!("/{SESSION_MARKER}/{}", self.public_session_id));
        }
        name
    }

    /// e.g. `/node/heron/client/joe/session/2`; relative when the node is unknown
    pub fn absolute_name(&self) -> String {
        match &self.node_id {
            Some(node) => format!("/{ROOT_MARKER}/{node}/{}", self.relative_name()),
            None => self.relative_name(),
        }
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.absolute_name())
    }
}

impl FromStr for SessionName {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
