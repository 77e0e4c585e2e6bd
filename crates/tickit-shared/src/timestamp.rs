//! Serde adapter for server timestamps.
//!
//! The backend may emit RFC 3339 with an offset or a naive
//! `YYYY-MM-DDTHH:MM:SS[.fraction]` value. Naive values are taken as UTC.
//! Serialization always writes RFC 3339.

use chrono::{
  DateTime,
  NaiveDateTime,
  SecondsFormat,
  Utc
};
use serde::{
  Deserialize,
  Deserializer,
  Serializer
};

const NAIVE_FORMATS: [&str; 2] = [
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f"
];

pub fn serialize<S>(
  dt: &DateTime<Utc>,
  serializer: S
) -> Result<S::Ok, S::Error>
where
  S: Serializer
{
  serializer.serialize_str(
    &dt.to_rfc3339_opts(
      SecondsFormat::AutoSi,
      true
    )
  )
}

pub fn deserialize<'de, D>(
  deserializer: D
) -> Result<DateTime<Utc>, D::Error>
where
  D: Deserializer<'de>
{
  let raw =
    String::deserialize(deserializer)?;
  parse(&raw).ok_or_else(|| {
    serde::de::Error::custom(format!(
      "invalid timestamp: {raw}"
    ))
  })
}

pub fn parse(
  raw: &str
) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(
      dt.with_timezone(&Utc)
    );
  }

  NAIVE_FORMATS.iter().find_map(|fmt| {
    NaiveDateTime::parse_from_str(
      raw, fmt
    )
    .ok()
    .map(|ndt| ndt.and_utc())
  })
}
