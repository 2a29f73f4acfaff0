// SPDX-License-Identifier: Apache-2.0

//! Public Key Records.
//!
//! A PKR is a frozen identity reference: uuid, kind, opaque public key,
//! optional minter handle, and a parsed expiration instant. Everything is
//! fixed at construction; refresh replaces the whole record.
//!
//! Expiration strings are `<quantity> <unit>` with the quantity a number or
//! a small word (`one` … `ten`, `a`, `an`) and the unit ranging from
//! milliseconds to weeks, case-insensitive. Anything unparseable — and an
//! absent expiration — falls back to one week.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use thiserror::Error;

use crate::handle::KeyHandle;
use crate::principal::PrincipalKind;

/// Errors raised by PKR construction.
#[derive(Debug, Error)]
pub enum PkrError {
    /// The uuid was empty.
    #[error("invalid PKR uuid: must be a non-empty string")]
    InvalidUuid,
}

/// Construction parameters for a [`Pkr`].
#[derive(Debug, Clone)]
pub struct PkrSpec {
    /// Principal uuid the record refers to.
    pub uuid: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Principal kind.
    pub kind: PrincipalKind,
    /// Opaque public key handle.
    pub public_key: KeyHandle,
    /// Opaque handle of the key's minter, if known.
    pub minter: Option<KeyHandle>,
    /// Expiration phrase; `None` or unparseable means one week.
    pub expiration: Option<String>,
}

/// Immutable identity record with parsed expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pkr {
    uuid: String,
    name: Option<String>,
    kind: PrincipalKind,
    public_key: KeyHandle,
    minter: Option<KeyHandle>,
    expires_at: DateTime<Utc>,
}

impl Pkr {
    /// Creates a record from a full spec. Frozen afterwards.
    pub fn from_spec(spec: PkrSpec) -> Result<Self, PkrError> {
        if spec.uuid.is_empty() {
            return Err(PkrError::InvalidUuid);
        }
        Ok(Self {
            uuid: spec.uuid,
            name: spec.name,
            kind: spec.kind,
            public_key: spec.public_key,
            minter: spec.minter,
            expires_at: Utc::now() + parse_expiration(spec.expiration.as_deref()),
        })
    }

    /// Creates a record with default name, minter, and expiration.
    pub fn new(
        uuid: impl Into<String>,
        kind: PrincipalKind,
        public_key: KeyHandle,
    ) -> Result<Self, PkrError> {
        Self::from_spec(PkrSpec {
            uuid: uuid.into(),
            name: None,
            kind,
            public_key,
            minter: None,
            expiration: None,
        })
    }

    /// The principal uuid.
    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Optional display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Principal kind.
    #[must_use]
    pub fn kind(&self) -> PrincipalKind {
        self.kind
    }

    /// Opaque public key handle.
    #[must_use]
    pub fn public_key(&self) -> KeyHandle {
        self.public_key
    }

    /// Opaque minter handle, if recorded.
    #[must_use]
    pub fn minter(&self) -> Option<KeyHandle> {
        self.minter
    }

    /// Expiration instant.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the record has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Whether `minter` minted this record's key.
    #[must_use]
    pub fn is_minter(&self, minter: KeyHandle) -> bool {
        self.minter == Some(minter)
    }

    /// Whether the record is unexpired and minted by `minter`.
    #[must_use]
    pub fn is_valid(&self, minter: KeyHandle) -> bool {
        !self.is_expired() && self.is_minter(minter)
    }

    /// Whether both records refer to the same principal (uuid only).
    #[must_use]
    pub fn equals(&self, other: &Pkr) -> bool {
        self.uuid == other.uuid
    }

    /// Serializes the record's public surface.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "uuid": self.uuid,
            "name": self.name,
            "kind": self.kind.as_str(),
            "publicKey": self.public_key,
            "expiresAt": self.expires_at.to_rfc3339(),
        })
    }
}

/// Default expiration: one week.
fn default_expiration() -> Duration {
    Duration::weeks(1)
}

fn word_quantity(word: &str) -> Option<i64> {
    Some(match word {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        _ => return None,
    })
}

fn unit_duration(unit: &str, quantity: i64) -> Option<Duration> {
    Some(match unit {
        "week" | "weeks" | "wk" | "wks" => Duration::weeks(quantity),
        "day" | "days" => Duration::days(quantity),
        "hour" | "hours" | "hr" | "hrs" => Duration::hours(quantity),
        "minute" | "minutes" | "min" | "mins" => Duration::minutes(quantity),
        "second" | "seconds" | "sec" | "secs" => Duration::seconds(quantity),
        "millisecond" | "milliseconds" | "ms" | "msec" | "msecs" => {
            Duration::milliseconds(quantity)
        }
        _ => return None,
    })
}

/// Parses an expiration phrase; invalid input yields the one-week default.
pub(crate) fn parse_expiration(raw: Option<&str>) -> Duration {
    let Some(raw) = raw else {
        return default_expiration();
    };
    let lowered = raw.trim().to_lowercase();
    let mut parts = lowered.split_whitespace();
    let (Some(quantity), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return default_expiration();
    };
    let Some(quantity) = quantity.parse::<i64>().ok().or_else(|| word_quantity(quantity)) else {
        return default_expiration();
    };
    if quantity < 0 {
        return default_expiration();
    }
    unit_duration(unit, quantity).unwrap_or_else(default_expiration)
}
