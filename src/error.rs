use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
    AuthFailed(String),
    TokenExpired(&'static str),
    CredentialsRejected(String),
    Transport { status: Option<u16>, body: String },
    Api { code: i64, message: String, body: String },
    UnsupportedDevice(String),
    UnknownDevice(String),
    InvalidInput(String),
    Probe(String),
    Storage(String),
    UpdateFailed(Box<Error>),
    NotConnected,
}

impl Error {
    pub(crate) fn transport(status: Option<u16>, body: impl Into<String>) -> Self {
        Error::Transport {
            status,
            body: body.into(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn is_credential_error(&self) -> bool {
        match self {
            Error::CredentialsRejected(_) | Error::TokenExpired(_) => true,
            Error::Transport { status, .. } => matches!(status, Some(401 | 403)),
            Error::UpdateFailed(inner) => inner.is_credential_error(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::AuthFailed(msg) => write!(f, "authentication failed: {msg}"),
            Error::TokenExpired(which) => write!(f, "{which} expired"),
            Error::CredentialsRejected(msg) => write!(f, "AWS credentials rejected: {msg}"),
            Error::Transport {
                status: Some(s),
                body,
            } => write!(f, "transport error (HTTP {s}): {body}"),
            Error::Transport { status: None, body } => write!(f, "transport error: {body}"),
            Error::Api { code, message, .. } => write!(f, "cloud error {code}: {message}"),
            Error::UnsupportedDevice(id) => write!(f, "device {id} is not supported"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::Probe(msg) => write!(f, "bundle probe failed: {msg}"),
            Error::Storage(msg) => write!(f, "storage error: {msg}"),
            Error::UpdateFailed(e) => write!(f, "update failed: {e}"),
            Error::NotConnected => write!(f, "not connected"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::UpdateFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Probe(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
