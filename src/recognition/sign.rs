//! Request signing for the recognition endpoint.
//!
//! The remote service recomputes the signature and rejects anything that
//! does not match byte for byte. The pre-sign string is:
//!
//! ```text
//! <body fields sorted by key as k=v> & app-id=.. & random-str=.. & timestamp=.. & secret=..
//! ```
//!
//! joined with `&`, and the signature is its lowercase hex MD5.

use md5::{Digest, Md5};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub const NONCE_LEN: usize = 16;

/// Headers sent with every attempt. Regenerated per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub app_id: String,
    pub random_str: String,
    pub timestamp: u64,
    pub sign: String,
}

impl SignedHeaders {
    pub fn as_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("app-id", self.app_id.clone()),
            ("random-str", self.random_str.clone()),
            ("timestamp", self.timestamp.to_string()),
            ("sign", self.sign.clone()),
        ]
    }
}

/// Builds the exact string that gets hashed.
pub fn pre_sign_string(
    fields: &BTreeMap<String, String>,
    app_id: &str,
    nonce: &str,
    timestamp: u64,
    app_secret: &str,
) -> String {
    // BTreeMap iterates in key order, which is the required sort.
    let mut params: Vec<String> = fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    params.push(format!("app-id={}", app_id));
    params.push(format!("random-str={}", nonce));
    params.push(format!("timestamp={}", timestamp));
    params.push(format!("secret={}", app_secret));
    params.join("&")
}

pub fn signature(
    fields: &BTreeMap<String, String>,
    app_id: &str,
    nonce: &str,
    timestamp: u64,
    app_secret: &str,
) -> String {
    let pre = pre_sign_string(fields, app_id, nonce, timestamp, app_secret);
    format!("{:x}", Md5::digest(pre.as_bytes()))
}

pub fn sign_with(
    fields: &BTreeMap<String, String>,
    app_id: &str,
    app_secret: &str,
    nonce: String,
    timestamp: u64,
) -> SignedHeaders {
    let sign = signature(fields, app_id, &nonce, timestamp, app_secret);
    SignedHeaders {
        app_id: app_id.to_string(),
        random_str: nonce,
        timestamp,
        sign,
    }
}

/// Signs with a fresh nonce and the current time.
pub fn sign(fields: &BTreeMap<String, String>, app_id: &str, app_secret: &str) -> SignedHeaders {
    sign_with(fields, app_id, app_secret, random_nonce(), unix_timestamp())
}

pub fn random_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_signature_without_body_fields() {
        let fields = BTreeMap::new();
        assert_eq!(
            pre_sign_string(&fields, "A1", "N1", 1000, "S1"),
            "app-id=A1&random-str=N1&timestamp=1000&secret=S1"
        );
        // md5("app-id=A1&random-str=N1&timestamp=1000&secret=S1")
        assert_eq!(
            signature(&fields, "A1", "N1", 1000, "S1"),
            "41eab46d801241052c447e998f25ff8c"
        );
    }

    #[test]
    fn body_fields_are_sorted_and_come_first() {
        let fields = BTreeMap::from([
            ("mode".to_string(), "auto".to_string()),
            ("format".to_string(), "latex".to_string()),
        ]);
        assert_eq!(
            pre_sign_string(&fields, "A1", "N1", 1000, "S1"),
            "format=latex&mode=auto&app-id=A1&random-str=N1&timestamp=1000&secret=S1"
        );
        assert_eq!(
            signature(&fields, "A1", "N1", 1000, "S1"),
            "6b06e946247a2333e45b514ed3f781b6"
        );
    }

    #[test]
    fn nonce_is_sixteen_alphanumerics() {
        let a = random_nonce();
        let b = random_nonce();
        assert_eq!(a.len(), NONCE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_signatures_differ() {
        let fields = BTreeMap::new();
        let a = sign(&fields, "A1", "S1");
        let b = sign(&fields, "A1", "S1");
        assert_ne!(a.random_str, b.random_str);
        assert_ne!(a.sign, b.sign);
        assert_eq!(a.sign.len(), 32);
        assert!(a.sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
