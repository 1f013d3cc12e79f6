use serde::{Deserialize, Serialize};

use crate::error::StatsError;

const MAX_ADDRESS_LEN: usize = 128;

fn zero_hashrate() -> String {
    "0".to_string()
}

/// Per-address statistics from `/users/{address}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default = "zero_hashrate")]
    pub hashrate1m: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate5m: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate1hr: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate1d: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate7d: String,
    /// Unix seconds of the most recent accepted share.
    #[serde(default)]
    pub lastshare: u64,
    #[serde(default)]
    pub workers: u64,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub bestshare: f64,
    #[serde(default)]
    pub bestever: f64,
    #[serde(default)]
    pub authorised: u64,
    #[serde(default)]
    pub worker: Vec<WorkerRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    #[serde(default)]
    pub workername: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate1m: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate5m: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate1hr: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate1d: String,
    #[serde(default = "zero_hashrate")]
    pub hashrate7d: String,
    #[serde(default)]
    pub lastshare: u64,
    #[serde(default)]
    pub shares: f64,
    #[serde(default)]
    pub bestshare: f64,
    #[serde(default)]
    pub bestever: f64,
}

impl UserRecord {
    pub fn from_json(body: &str) -> Result<Self, StatsError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Addresses are interpolated into the upstream URL, so only plain
/// alphanumeric strings are accepted.
pub fn validate_address(address: &str) -> Result<(), StatsError> {
    if address.is_empty()
        || address.len() > MAX_ADDRESS_LEN
        || !address.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(StatsError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_DOC: &str = r#"{
        "hashrate1m": "1.2T",
        "hashrate5m": "1.1T",
        "hashrate1hr": "1.05T",
        "hashrate1d": "998G",
        "hashrate7d": "1.01T",
        "lastshare": 1752001900,
        "workers": 2,
        "shares": 48213377,
        "bestshare": 1843211.442,
        "bestever": 9911332,
        "authorised": 1750000000,
        "worker": [
            {"workername": "bc1qexample.rig1", "hashrate1m": "700G", "hashrate5m": "690G", "hashrate1hr": "650G", "hashrate1d": "600G", "hashrate7d": "610G", "lastshare": 1752001900, "shares": 30000000, "bestshare": 1843211.442, "bestever": 9911332},
            {"workername": "bc1qexample.rig2", "hashrate1hr": "400G", "shares": 18213377, "bestshare": 22.5}
        ]
    }"#;

    #[test]
    fn test_user_record_deserialization() {
        let user = UserRecord::from_json(USER_DOC).unwrap();
        assert_eq!(user.hashrate1m, "1.2T");
        assert_eq!(user.hashrate1d, "998G");
        assert_eq!(user.lastshare, 1752001900);
        assert!((user.bestshare - 1843211.442).abs() < 1e-6);
        assert_eq!(user.worker.len(), 2);
        assert_eq!(user.worker[0].workername, "bc1qexample.rig1");
        assert_eq!(user.worker[1].hashrate1hr, "400G");
        assert_eq!(user.worker[1].hashrate1m, "0");
        assert_eq!(user.worker[1].bestshare, 22.5);
    }

    #[test]
    fn test_sparse_user_document_defaults() {
        let user = UserRecord::from_json("{}").unwrap();
        assert_eq!(user.hashrate1m, "0");
        assert_eq!(user.lastshare, 0);
        assert!(user.worker.is_empty());
    }

    #[test]
    fn test_malformed_user_document() {
        let err = UserRecord::from_json("not json").unwrap_err();
        assert!(matches!(err, StatsError::MalformedUser(_)));

        let err = UserRecord::from_json(r#"{"worker": 5}"#).unwrap_err();
        assert!(matches!(err, StatsError::MalformedUser(_)));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq").is_ok());
        assert!(validate_address("1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("../pool/pool.status").is_err());
        assert!(validate_address("abc?x=1").is_err());
        assert!(validate_address(&"a".repeat(129)).is_err());
        assert!(validate_address("bc1q with space").unwrap_err().is_caller_error());
    }
}
