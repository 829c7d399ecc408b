// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # DateTime Serde Module
//!
//! RFC3339-compliant serialization and deserialization for `DateTime<Utc>`
//! fields across the pipeline. Every persisted timestamp; change records,
//! processing steps, schema metadata, document metadata; goes through this
//! module so the wire and file formats carry one format only:
//!
//! - Basic format: `YYYY-MM-DDTHH:MM:SSZ`
//! - With fractional seconds: `YYYY-MM-DDTHH:MM:SS.ssssssZ`
//! - Always UTC (`Z` suffix); inputs in other offsets are normalized
//!
//! Use with the `#[serde(with = "...")]` attribute:
//!
//! ```
//! use chrono::{DateTime, Utc};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Stamped {
//!     #[serde(with = "docpipe_domain::services::datetime_serde")]
//!     at: DateTime<Utc>,
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Serializes a `DateTime<Utc>` to an RFC3339 string.
pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

/// Deserializes an RFC3339 string to a `DateTime<Utc>`.
///
/// Inputs carrying a non-UTC offset are converted; malformed strings are
/// rejected with the parser's message.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// Serialization for `Option<DateTime<Utc>>` fields.
///
/// `Some(dt)` serializes to an RFC3339 string, `None` to null.
pub mod optional {
    use super::*;

    pub fn serialize<S>(opt_dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match opt_dt {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt_s: Option<String> = Option::deserialize(deserializer)?;
        match opt_s {
            Some(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super")]
        at: DateTime<Utc>,
        #[serde(with = "super::optional")]
        maybe: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_round_trip() {
        let stamped = Stamped {
            at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap(),
            maybe: None,
        };
        let json = serde_json::to_string(&stamped).unwrap();
        assert!(json.contains("2024-01-15T10:30:45"));
        assert!(json.contains("null"));
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(stamped, back);
    }

    #[test]
    fn test_offset_input_normalized_to_utc() {
        let json = r#"{"at":"2024-01-15T12:30:45+02:00","maybe":"2024-01-15T00:00:00Z"}"#;
        let back: Stamped = serde_json::from_str(json).unwrap();
        assert_eq!(back.at, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 45).unwrap());
        assert!(back.maybe.is_some());
    }

    #[test]
    fn test_malformed_input_rejected() {
        let json = r#"{"at":"January 15th","maybe":null}"#;
        assert!(serde_json::from_str::<Stamped>(json).is_err());
    }
}
