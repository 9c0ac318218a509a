//! Error types for the xmlBlaster client connection layer
//!
//! Every failure surfaced to callers is a [`ClientError`]. Each variant maps to
//! one of the protocol's dotted error-code strings (see [`ErrorCode`]) so that
//! failures can be reported back to the server in its own vocabulary.

use crate::config::ConfigError;
use crate::connection::ConnectionState;
use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Protocol error codes understood by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InternalUnknown,
    InternalIllegalArgument,
    InternalIllegalState,
    CommunicationNoConnection,
    CommunicationTimeout,
    CommunicationNoConnectionPolling,
    CommunicationNoConnectionDead,
    UserNotConnected,
    UserIllegalArgument,
    UserConnect,
    UserUpdateError,
    UserUpdateInternalError,
    UserUpdateIllegalArgument,
    UserUpdateAccessDenied,
    UserNotAuthorized,
    ResourceConfiguration,
    ResourceConfigurationXml,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InternalUnknown => "internal.unknown",
            ErrorCode::InternalIllegalArgument => "internal.illegalArgument",
            ErrorCode::InternalIllegalState => "internal.illegalState",
            ErrorCode::CommunicationNoConnection => "communication.noConnection",
            ErrorCode::CommunicationTimeout => "communication.timeout",
            ErrorCode::CommunicationNoConnectionPolling => "communication.noConnection.polling",
            ErrorCode::CommunicationNoConnectionDead => "communication.noConnection.dead",
            ErrorCode::UserNotConnected => "user.notConnected",
            ErrorCode::UserIllegalArgument => "user.illegalArgument",
            ErrorCode::UserConnect => "user.connect",
            ErrorCode::UserUpdateError => "user.update.error",
            ErrorCode::UserUpdateInternalError => "user.update.internalError",
            ErrorCode::UserUpdateIllegalArgument => "user.update.illegalArgument",
            ErrorCode::UserUpdateAccessDenied => {
                "user.update.security.authentication.accessDenied"
            }
            ErrorCode::UserNotAuthorized => "user.security.authorization.notAuthorized",
            ErrorCode::ResourceConfiguration => "resource.configuration",
            ErrorCode::ResourceConfigurationXml => "resource.configuration.xml",
        }
    }

    /// Look up a code by its wire string
    pub fn parse(code: &str) -> Option<Self> {
        const ALL: [ErrorCode; 17] = [
            ErrorCode::InternalUnknown,
            ErrorCode::InternalIllegalArgument,
            ErrorCode::InternalIllegalState,
            ErrorCode::CommunicationNoConnection,
            ErrorCode::CommunicationTimeout,
            ErrorCode::CommunicationNoConnectionPolling,
            ErrorCode::CommunicationNoConnectionDead,
            ErrorCode::UserNotConnected,
            ErrorCode::UserIllegalArgument,
            ErrorCode::UserConnect,
            ErrorCode::UserUpdateError,
            ErrorCode::UserUpdateInternalError,
            ErrorCode::UserUpdateIllegalArgument,
            ErrorCode::UserUpdateAccessDenied,
            ErrorCode::UserNotAuthorized,
            ErrorCode::ResourceConfiguration,
            ErrorCode::ResourceConfigurationXml,
        ];
        ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// Communication failures are the ones a failsafe client recovers from
    pub fn is_communication(&self) -> bool {
        self.as_str().starts_with("communication.")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for client connection operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not connected ({state}): {message}")]
    NotConnected {
        state: ConnectionState,
        code: ErrorCode,
        message: String,
    },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Malformed protocol data: {message}")]
    MalformedProtocolData { message: String },

    #[error("Transport error: {0}")]
    Transport(TransportError),

    #[error("Server fault [{code}]: {message}")]
    RemoteFault { code: String, message: String },

    #[error("Internal error [{code}]: {message}")]
    Internal { code: ErrorCode, message: String },

    #[error("Update rejected [{code}]: {message}")]
    Update { code: ErrorCode, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RemoteFault {
                error_code,
                message,
            } => ClientError::RemoteFault {
                code: error_code,
                message,
            },
            other => ClientError::Transport(other),
        }
    }
}

impl ClientError {
    /// Create not-connected error for the given state
    pub fn not_connected<S: Into<String>>(state: ConnectionState, message: S) -> Self {
        let code = match state {
            ConnectionState::Polling => ErrorCode::CommunicationNoConnectionPolling,
            ConnectionState::Dead => ErrorCode::CommunicationNoConnectionDead,
            _ => ErrorCode::UserNotConnected,
        };
        Self::NotConnected {
            state,
            code,
            message: message.into(),
        }
    }

    /// Create protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create malformed protocol data error
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedProtocolData {
            message: message.into(),
        }
    }

    /// Create internal illegal-state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            code: ErrorCode::InternalIllegalState,
            message: message.into(),
        }
    }

    /// Create internal illegal-argument error
    pub fn illegal_argument<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            code: ErrorCode::InternalIllegalArgument,
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            code: ErrorCode::InternalUnknown,
            message: message.into(),
        }
    }

    /// Create update failure with one of the `user.update.*` codes
    pub fn update<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self::Update {
            code,
            message: message.into(),
        }
    }

    /// Protocol error-code string for this failure
    pub fn error_code(&self) -> String {
        match self {
            ClientError::NotConnected { code, .. } => code.as_str().to_string(),
            ClientError::Protocol { .. } => ErrorCode::InternalIllegalArgument.as_str().to_string(),
            ClientError::MalformedProtocolData { .. } => {
                ErrorCode::UserIllegalArgument.as_str().to_string()
            }
            ClientError::Transport(TransportError::Timeout { .. }) => {
                ErrorCode::CommunicationTimeout.as_str().to_string()
            }
            ClientError::Transport(_) => ErrorCode::CommunicationNoConnection.as_str().to_string(),
            ClientError::RemoteFault { code, .. } => code.clone(),
            ClientError::Internal { code, .. } => code.as_str().to_string(),
            ClientError::Update { code, .. } => code.as_str().to_string(),
            ClientError::Config(_) => ErrorCode::ResourceConfiguration.as_str().to_string(),
        }
    }

    /// True for failures caused by a lost or unreachable server
    pub fn is_communication_failure(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::RemoteFault { code, .. } => code.starts_with("communication."),
            _ => false,
        }
    }

    /// Render as a server-side exception document
    pub fn to_exception_xml(&self) -> String {
        let message = sanitize_error_message(&self.to_string());
        format!(
            "<exception errorCode='{}'><message><![CDATA[{}]]></message></exception>",
            crate::codec::escape::escape_attr(&self.error_code()),
            message.replace("]]>", "]]]]><![CDATA[>")
        )
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|token|key|secret|sessionId)[=:]\s*[^\s'\x22]\S*")
        .expect("secret pattern is a valid regex")
});

static SECRET_XML_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(<passwd>).*?(</passwd>)|(sessionId=['\x22])[^'\x22]*(['\x22])")
        .expect("xml secret pattern is a valid regex")
});

/// Sanitize error messages so credentials and session secrets never leak
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_XML_PATTERN
        .replace_all(message, "${1}${3}***${2}${4}")
        .to_string();

    sanitized = SECRET_PATTERN
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let mut cut = 500 - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
