//! Pool-wide status as published by ckpool at `/pool/pool.status`.
//!
//! The body is several small JSON objects, one per line:
//!
//! ```text
//! {"runtime":2373426,"lastupdate":1752001916,"Users":12729,"Workers":50345,"Idle":8966,"Disconnected":2213}
//! {"hashrate1m":"314P","hashrate5m":"322P","hashrate15m":"311P","hashrate1hr":"360P","hashrate6hr":"316P","hashrate1d":"274P","hashrate7d":"183P"}
//! {"diff":76.2,"accepted":89150201900099,"rejected":788358901413,"bestshare":83821924668426,"SPS1m":3.92e3}
//! ```
//!
//! They are merged into one flat record. ckpool has changed the grouping of
//! these lines between versions, so the record keeps every key rather than
//! binding to a fixed layout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StatsError;

/// A merged record without this key is treated as a failed fetch.
pub const REQUIRED_FIELD: &str = "hashrate1d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashrateWindow {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
    SevenDays,
}

impl HashrateWindow {
    pub const ALL: [HashrateWindow; 7] = [
        HashrateWindow::OneMinute,
        HashrateWindow::FiveMinutes,
        HashrateWindow::FifteenMinutes,
        HashrateWindow::OneHour,
        HashrateWindow::SixHours,
        HashrateWindow::OneDay,
        HashrateWindow::SevenDays,
    ];

    pub fn key(self) -> &'static str {
        match self {
            HashrateWindow::OneMinute => "hashrate1m",
            HashrateWindow::FiveMinutes => "hashrate5m",
            HashrateWindow::FifteenMinutes => "hashrate15m",
            HashrateWindow::OneHour => "hashrate1hr",
            HashrateWindow::SixHours => "hashrate6hr",
            HashrateWindow::OneDay => "hashrate1d",
            HashrateWindow::SevenDays => "hashrate7d",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolStatusRecord {
    fields: Map<String, Value>,
}

impl PoolStatusRecord {
    /// Merge a newline-delimited body and check the required field is present.
    pub fn from_ndjson(body: &str) -> Result<Self, StatsError> {
        let fields = merge_lines(body)?;
        if !fields.contains_key(REQUIRED_FIELD) {
            return Err(StatsError::MissingField(REQUIRED_FIELD));
        }
        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Hashrate for `window` as published, e.g. `"274P"`.
    pub fn hashrate(&self, window: HashrateWindow) -> Option<String> {
        self.get(window.key()).map(display_value)
    }

    pub fn hashrate1d(&self) -> String {
        self.hashrate(HashrateWindow::OneDay).unwrap_or_default()
    }

    pub fn users(&self) -> u64 {
        self.counter("Users")
    }

    pub fn workers(&self) -> u64 {
        self.counter("Workers")
    }

    pub fn idle(&self) -> u64 {
        self.counter("Idle")
    }

    pub fn disconnected(&self) -> u64 {
        self.counter("Disconnected")
    }

    /// Seconds since the pool process started.
    pub fn runtime(&self) -> u64 {
        self.counter("runtime")
    }

    pub fn lastupdate(&self) -> u64 {
        self.counter("lastupdate")
    }

    fn counter(&self, key: &str) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Shallow-merge every non-blank line of `body` into one object.
///
/// Lines are applied in order and a key seen again overwrites the earlier
/// value, so conflicting keys across lines silently keep only the last one.
pub fn merge_lines(body: &str) -> Result<Map<String, Value>, StatsError> {
    let mut merged = Map::new();

    for (index, line) in body.split('\n').enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(line).map_err(|source| StatsError::MalformedLine {
            line: index + 1,
            source,
        })?;

        let Value::Object(object) = value else {
            return Err(StatsError::NotAnObject(index + 1));
        };

        for (key, value) in object {
            merged.insert(key, value);
        }
    }

    Ok(merged)
}

/// Strings are shown as-is, anything else in its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
