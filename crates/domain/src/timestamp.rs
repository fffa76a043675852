//! サーバーのタイムスタンプ変換
//!
//! サーバーはUTCオフセット付き（`+00:00`）とオフセットなしのISO-8601を混在して返す。
//! オフセットなしの値はUTCとして扱う。

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::errors::DomainError;

const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// ISO-8601文字列をUTC日時に変換
pub fn parse(value: &str) -> Result<DateTime<Utc>, DomainError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, NAIVE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| DomainError::InvalidTimestamp(value.to_string()))
}

/// `Option<DateTime<Utc>>` 用の serde ヘルパー
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|value| super::parse(&value).map_err(serde::de::Error::custom))
            .transpose()
    }
}
