use reqwest::StatusCode;
use thiserror::Error;
use tickit_shared::{
    DESCRIPTION_MAX_CHARS, PASSWORD_MIN_CHARS, TITLE_MAX_CHARS,
};

pub const FALLBACK_MESSAGE: &str = "request failed";

/// Field-limit violations caught before anything is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,

    #[error("title must be {max} characters or less (got {0})", max = TITLE_MAX_CHARS)]
    TitleTooLong(usize),

    #[error(
        "description must be {max} characters or less (got {0})",
        max = DESCRIPTION_MAX_CHARS
    )]
    DescriptionTooLong(usize),

    #[error("password must be at least {min} characters", min = PASSWORD_MIN_CHARS)]
    PasswordTooShort,

    #[error("nothing to update")]
    EmptyPatch,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{message} (HTTP {status})")]
    Request { status: StatusCode, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid api url: {0}")]
    InvalidUrl(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn request(status: StatusCode, message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
        Self::Request { status, message }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthenticated)
            || matches!(
                self.status(),
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            )
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
