//! Record builders, signed payloads and rules files for tests.

use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use pokeproxy_core::{codec::encode_record, models::Record};
use serde_json::{json, Value};
use sha2::Sha256;
use uuid::Uuid;

/// Base64 shared secret used by tests ("pokeproxy-test-secret").
pub const TEST_SECRET: &str = "cG9rZXByb3h5LXRlc3Qtc2VjcmV0";

/// Builder for test records.
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Starts from an all-default record.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fully populated fire/flying record.
    pub fn charizard() -> Self {
        Self {
            record: Record {
                number: 6,
                name: "Charizard".to_string(),
                type_one: "Fire".to_string(),
                type_two: "Flying".to_string(),
                total: 534,
                hit_points: 78,
                attack: 84,
                defense: 78,
                special_attack: 109,
                special_defense: 85,
                speed: 100,
                generation: 1,
                legendary: false,
            },
        }
    }

    /// A legendary psychic record.
    pub fn mewtwo() -> Self {
        Self {
            record: Record {
                number: 150,
                name: "Mewtwo".to_string(),
                type_one: "Psychic".to_string(),
                total: 680,
                hit_points: 106,
                attack: 110,
                defense: 90,
                special_attack: 154,
                special_defense: 90,
                speed: 130,
                generation: 1,
                legendary: true,
                ..Record::default()
            },
        }
    }

    /// Sets the attack stat.
    #[must_use]
    pub fn attack(mut self, attack: u64) -> Self {
        self.record.attack = attack;
        self
    }

    /// Sets the legendary flag.
    #[must_use]
    pub fn legendary(mut self, legendary: bool) -> Self {
        self.record.legendary = legendary;
        self
    }

    /// Returns the record.
    pub fn build(self) -> Record {
        self.record
    }
}

/// A payload and its signature.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Lowercase hex HMAC-SHA256 of `body`.
    pub signature: String,
}

/// Computes the lowercase hex HMAC-SHA256 of `body` under a base64 secret.
///
/// # Panics
///
/// Panics if `secret_b64` is not valid base64.
#[allow(clippy::expect_used)]
pub fn sign(body: &[u8], secret_b64: &str) -> String {
    let key = STANDARD.decode(secret_b64).expect("test secret must be valid base64");
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&key).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Encodes and signs a record with `TEST_SECRET`.
pub fn signed_payload(record: &Record) -> SignedPayload {
    let body = encode_record(record);
    let signature = sign(&body, TEST_SECRET);
    SignedPayload { body, signature }
}

/// Builds a rule entry in rules-file form.
pub fn rule_json(url: &str, reason: &str, predicates: &[&str]) -> Value {
    json!({"url": url, "reason": reason, "match": predicates})
}

/// Writes a rules file to a unique temporary path and returns it.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[allow(clippy::expect_used)]
pub fn write_rules_file(rules: &[Value]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("pokeproxy-rules-{}.json", Uuid::new_v4()));
    let contents = json!({ "rules": rules }).to_string();
    std::fs::write(&path, contents).expect("failed to write rules file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_matches_known_vector() {
        // RFC 4231 test case 2: key "Jefe".
        let secret = STANDARD.encode("Jefe");
        assert_eq!(
            sign(b"what do ya want for nothing?", &secret),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn builder_overrides_fields() {
        let record = RecordBuilder::charizard().attack(200).legendary(true).build();

        assert_eq!(record.name, "Charizard");
        assert_eq!(record.attack, 200);
        assert!(record.legendary);
    }

    #[test]
    fn rules_file_round_trips() {
        let path = write_rules_file(&[rule_json("http://a.test", "a", &["attack>1"])]);
        let contents: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(contents["rules"][0]["match"][0], "attack>1");
        std::fs::remove_file(path).unwrap();
    }
}
