//! Serde adapters encoding `DateTime<Utc>` collections as epoch milliseconds.
//!
//! Scalar fields use `chrono::serde::ts_milliseconds` directly; these modules
//! cover the set and map shapes chrono does not provide.

use chrono::{DateTime, Utc};
use serde::de::Error;

fn from_millis<E: Error>(ms: i64) -> Result<DateTime<Utc>, E> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| E::custom(format!("timestamp out of range: {}", ms)))
}

/// `BTreeSet<DateTime<Utc>>` as an array of epoch milliseconds.
pub mod set {
    use std::collections::BTreeSet;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(set: &BTreeSet<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(set.iter().map(|dt| dt.timestamp_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeSet<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Vec::<i64>::deserialize(deserializer)?
            .into_iter()
            .map(super::from_millis)
            .collect()
    }
}

/// `BTreeMap<DateTime<Utc>, V>` as an object keyed by epoch milliseconds.
pub mod map {
    use std::collections::BTreeMap;

    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, V>(map: &BTreeMap<DateTime<Utc>, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k.timestamp_millis(), v)))
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<DateTime<Utc>, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        BTreeMap::<i64, V>::deserialize(deserializer)?
            .into_iter()
            .map(|(ms, v)| Ok((super::from_millis::<D::Error>(ms)?, v)))
            .collect()
    }
}
