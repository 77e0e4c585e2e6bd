use std::fmt;
use std::str::FromStr;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

pub mod timestamp;

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize =
  1000;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub type TaskId = i64;

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Task {
  pub id:          TaskId,
  pub user_id:     String,
  pub title:       String,
  #[serde(
    default,
    deserialize_with = "null_as_empty"
  )]
  pub description: String,
  #[serde(default)]
  pub completed:   bool,
  #[serde(with = "timestamp")]
  pub created_at:  DateTime<Utc>,
  #[serde(with = "timestamp")]
  pub updated_at:  DateTime<Utc>
}

fn null_as_empty<'de, D>(
  deserializer: D
) -> Result<String, D::Error>
where
  D: serde::Deserializer<'de>
{
  Ok(
    Option::<String>::deserialize(
      deserializer
    )?
    .unwrap_or_default()
  )
}

/// Which tasks a list request returns.
///
/// The backend owns the filtering; `admits` documents the contract the
/// server is expected to honour.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

impl StatusFilter {
  pub const ALL: [StatusFilter; 3] = [
    StatusFilter::All,
    StatusFilter::Pending,
    StatusFilter::Completed
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      | StatusFilter::All => "all",
      | StatusFilter::Pending => {
        "pending"
      }
      | StatusFilter::Completed => {
        "completed"
      }
    }
  }

  pub fn admits(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Pending => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatusFilter(
  pub String
);

impl fmt::Display for UnknownStatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    write!(
      f,
      "unknown status filter '{}', \
       expected all, pending or \
       completed",
      self.0
    )
  }
}

impl std::error::Error
  for UnknownStatusFilter
{
}

impl FromStr for StatusFilter {
  type Err = UnknownStatusFilter;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let wanted =
      s.trim().to_ascii_lowercase();
    StatusFilter::ALL
      .into_iter()
      .find(|f| f.as_str() == wanted)
      .ok_or_else(|| {
        UnknownStatusFilter(s.to_string())
      })
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskCreate {
  pub title:       String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>
}

/// Partial update: only the fields that are `Some` are sent.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
  }
}

#[derive(
  Clone, Serialize, Deserialize,
)]
pub struct SignUpRequest {
  pub email:    String,
  pub password: String,
  pub name:     String
}

impl fmt::Debug for SignUpRequest {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("SignUpRequest")
      .field("email", &self.email)
      .field("password", &"<redacted>")
      .field("name", &self.name)
      .finish()
  }
}

#[derive(
  Clone, Serialize, Deserialize,
)]
pub struct SignInRequest {
  pub email:    String,
  pub password: String
}

impl fmt::Debug for SignInRequest {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("SignInRequest")
      .field("email", &self.email)
      .field("password", &"<redacted>")
      .finish()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct AuthUser {
  pub id:    String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub name:  Option<String>
}

#[derive(
  Clone, Serialize, Deserialize,
)]
pub struct AuthResponse {
  pub token: String,
  pub user:  AuthUser
}

impl fmt::Debug for AuthResponse {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("AuthResponse")
      .field("token", &"<redacted>")
      .field("user", &self.user)
      .finish()
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct HealthStatus {
  pub status:  String,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub version: Option<String>
}
