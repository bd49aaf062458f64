use std::{fmt, time::Duration};

/// Errors returned by resource clients, identity construction, and waits.
///
/// API failures keep the underlying [`kube::Error`] so that callers can log
/// the server's message, while [`Error::kind`] exposes the authorization
/// decision (or lack of one) that tests assert on.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource not found")]
    NotFound(#[source] kube::Error),

    #[error("request forbidden")]
    Forbidden(#[source] kube::Error),

    #[error("resource already exists")]
    Conflict(#[source] kube::Error),

    #[error("transient API failure")]
    Transient(#[source] kube::Error),

    #[error("API request failed")]
    Api(#[source] kube::Error),

    #[error("request could not be issued")]
    Request(#[source] kube::Error),

    #[error("failed to build client for {principal:?}")]
    Client {
        principal: String,
        #[source]
        source: kube::Error,
    },

    #[error("failed to infer cluster configuration")]
    Config(#[from] kube::config::InferConfigError),

    #[error("failed to load kubeconfig")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("invalid identity {0:?}")]
    InvalidIdentity(String),

    #[error("poll interval {interval:?} must be less than timeout {timeout:?}")]
    InvalidWait {
        interval: Duration,
        timeout: Duration,
    },
}

/// The coarse classification of an [`Error`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Transient,
    Other,
    Fatal,
}

// === impl Error ===

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Api(_) => ErrorKind::Other,
            Self::Request(_)
            | Self::Client { .. }
            | Self::Config(_)
            | Self::Kubeconfig(_)
            | Self::InvalidIdentity(_)
            | Self::InvalidWait { .. } => ErrorKind::Fatal,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    #[inline]
    pub fn is_forbidden(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    /// Returns true if the request may succeed when retried.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl From<kube::Error> for Error {
    fn from(error: kube::Error) -> Self {
        match &error {
            kube::Error::Api(rsp) => match rsp.code {
                404 => Self::NotFound(error),
                403 => Self::Forbidden(error),
                409 => Self::Conflict(error),
                429 | 500 | 502 | 503 | 504 => Self::Transient(error),
                _ => Self::Api(error),
            },
            kube::Error::HyperError(_) | kube::Error::Service(_) => Self::Transient(error),
            _ => Self::Request(error),
        }
    }
}

// === impl ErrorKind ===

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "NotFound",
            Self::Forbidden => "Forbidden",
            Self::Conflict => "Conflict",
            Self::Transient => "Transient",
            Self::Other => "Other",
            Self::Fatal => "Fatal",
        };
        f.write_str(s)
    }
}
