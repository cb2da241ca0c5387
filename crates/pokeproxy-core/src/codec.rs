//! Wire codec and record normalization.
//!
//! Inbound payloads are protobuf-encoded. Decoding is strict: bytes that do
//! not parse as the wire message are rejected with a `DecodeError` carrying
//! a short hex preview. Normalization is lenient: once a payload decodes,
//! every field is mapped independently from the raw field map, and a field
//! whose value cannot be coerced falls back to its default.

use prost::Message;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{Field, FieldKind, Record};

/// Number of payload bytes shown in a decode error preview.
pub const PREVIEW_BYTES: usize = 32;

/// Protobuf wire form of a record.
#[derive(Clone, PartialEq, Message)]
pub struct PokemonMessage {
    /// Tag 1.
    #[prost(uint64, tag = "1")]
    pub number: u64,
    /// Tag 2.
    #[prost(string, tag = "2")]
    pub name: String,
    /// Tag 3.
    #[prost(string, tag = "3")]
    pub type_one: String,
    /// Tag 4.
    #[prost(string, tag = "4")]
    pub type_two: String,
    /// Tag 5.
    #[prost(uint64, tag = "5")]
    pub total: u64,
    /// Tag 6.
    #[prost(uint64, tag = "6")]
    pub hit_points: u64,
    /// Tag 7.
    #[prost(uint64, tag = "7")]
    pub attack: u64,
    /// Tag 8.
    #[prost(uint64, tag = "8")]
    pub defense: u64,
    /// Tag 9.
    #[prost(uint64, tag = "9")]
    pub special_attack: u64,
    /// Tag 10.
    #[prost(uint64, tag = "10")]
    pub special_defense: u64,
    /// Tag 11.
    #[prost(uint64, tag = "11")]
    pub speed: u64,
    /// Tag 12.
    #[prost(uint64, tag = "12")]
    pub generation: u64,
    /// Tag 13.
    #[prost(bool, tag = "13")]
    pub legendary: bool,
}

impl From<&Record> for PokemonMessage {
    fn from(record: &Record) -> Self {
        Self {
            number: record.number,
            name: record.name.clone(),
            type_one: record.type_one.clone(),
            type_two: record.type_two.clone(),
            total: record.total,
            hit_points: record.hit_points,
            attack: record.attack,
            defense: record.defense,
            special_attack: record.special_attack,
            special_defense: record.special_defense,
            speed: record.speed,
            generation: record.generation,
            legendary: record.legendary,
        }
    }
}

/// Payload bytes that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed payload: {message} (first bytes: {preview})")]
pub struct DecodeError {
    /// Decoder diagnostic.
    pub message: String,
    /// Lowercase hex of the leading payload bytes.
    pub preview: String,
}

impl DecodeError {
    fn new(message: impl Into<String>, bytes: &[u8]) -> Self {
        Self { message: message.into(), preview: hex_preview(bytes) }
    }
}

/// Field map produced by the decoder, before normalization.
///
/// Keys are field names; values are whatever the source carried. Unknown
/// keys are allowed and ignored by `normalize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Wraps an existing field map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Looks up a raw value by field name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

impl From<PokemonMessage> for RawRecord {
    fn from(message: PokemonMessage) -> Self {
        let mut map = Map::with_capacity(Field::ALL.len());
        map.insert("number".into(), message.number.into());
        map.insert("name".into(), message.name.into());
        map.insert("type_one".into(), message.type_one.into());
        map.insert("type_two".into(), message.type_two.into());
        map.insert("total".into(), message.total.into());
        map.insert("hit_points".into(), message.hit_points.into());
        map.insert("attack".into(), message.attack.into());
        map.insert("defense".into(), message.defense.into());
        map.insert("special_attack".into(), message.special_attack.into());
        map.insert("special_defense".into(), message.special_defense.into());
        map.insert("speed".into(), message.speed.into());
        map.insert("generation".into(), message.generation.into());
        map.insert("legendary".into(), message.legendary.into());
        Self(map)
    }
}

/// Decodes a protobuf payload into a raw field map.
///
/// # Errors
///
/// Returns `DecodeError` when the bytes are not a valid wire message. No
/// placeholder record is ever substituted.
pub fn decode_record(bytes: &[u8]) -> Result<RawRecord, DecodeError> {
    debug!(size = bytes.len(), "Decoding payload");

    PokemonMessage::decode(bytes)
        .map(RawRecord::from)
        .map_err(|e| DecodeError::new(e.to_string(), bytes))
}

/// Encodes a record into its protobuf wire form.
pub fn encode_record(record: &Record) -> Vec<u8> {
    PokemonMessage::from(record).encode_to_vec()
}

/// Builds a typed record from a raw field map.
///
/// Never fails. Each field is coerced on its own; a missing or unusable value
/// yields that field's default without affecting the others.
pub fn normalize(raw: &RawRecord) -> Record {
    Record {
        number: integer(raw, Field::Number),
        name: text(raw, Field::Name),
        type_one: text(raw, Field::TypeOne),
        type_two: text(raw, Field::TypeTwo),
        total: integer(raw, Field::Total),
        hit_points: integer(raw, Field::HitPoints),
        attack: integer(raw, Field::Attack),
        defense: integer(raw, Field::Defense),
        special_attack: integer(raw, Field::SpecialAttack),
        special_defense: integer(raw, Field::SpecialDefense),
        speed: integer(raw, Field::Speed),
        generation: integer(raw, Field::Generation),
        legendary: boolean(raw, Field::Legendary),
    }
}

fn integer(raw: &RawRecord, field: Field) -> u64 {
    debug_assert_eq!(field.kind(), FieldKind::Integer);
    let coerced = match raw.get(field.name()) {
        None | Some(Value::Null) => return 0,
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) if is_ascii_digits(s) => s.parse().ok(),
        Some(_) => None,
    };
    coerced.unwrap_or_else(|| reverted(raw, field, 0))
}

fn text(raw: &RawRecord, field: Field) -> String {
    debug_assert_eq!(field.kind(), FieldKind::Text);
    match raw.get(field.name()) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(_) => reverted(raw, field, String::new()),
    }
}

fn boolean(raw: &RawRecord, field: Field) -> bool {
    debug_assert_eq!(field.kind(), FieldKind::Boolean);
    let coerced = match raw.get(field.name()) {
        None | Some(Value::Null) => return false,
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Some(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Some(false),
        Some(_) => None,
    };
    coerced.unwrap_or_else(|| reverted(raw, field, false))
}

fn reverted<T>(raw: &RawRecord, field: Field, default: T) -> T {
    debug!(
        field = %field,
        value = ?raw.get(field.name()),
        "Field value could not be coerced, using default"
    );
    default
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Renders up to `PREVIEW_BYTES` bytes as lowercase hex.
pub fn hex_preview(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(PREVIEW_BYTES)];
    let mut preview = hex::encode(shown);
    if bytes.len() > PREVIEW_BYTES {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => RawRecord::from_map(map),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn decode_then_normalize_preserves_record() {
        let record = Record {
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
        };

        let decoded = decode_record(&encode_record(&record)).unwrap();

        assert_eq!(normalize(&decoded), record);
    }

    #[test]
    fn empty_payload_decodes_to_defaults() {
        let decoded = decode_record(&[]).unwrap();
        assert_eq!(normalize(&decoded), Record::default());
    }

    #[test]
    fn corrupt_payload_is_rejected_with_preview() {
        // Field 2 declared as length-delimited with a length past the end.
        let bytes = [0x12, 0x7f, b'a', b'b'];

        let err = decode_record(&bytes).unwrap_err();

        assert_eq!(err.preview, "127f6162");
        assert!(!err.message.is_empty());
    }

    #[test]
    fn invalid_utf8_in_string_field_is_rejected() {
        let bytes = [0x12, 0x02, 0xff, 0xfe];
        assert!(decode_record(&bytes).is_err());
    }

    #[test]
    fn preview_is_bounded() {
        let bytes = vec![0xab; 100];
        let preview = hex_preview(&bytes);

        assert_eq!(preview.len(), PREVIEW_BYTES * 2 + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn normalize_fills_missing_fields_with_defaults() {
        let record = normalize(&raw(json!({"name": "Pikachu", "attack": 55})));

        assert_eq!(record.name, "Pikachu");
        assert_eq!(record.attack, 55);
        assert_eq!(record.defense, 0);
        assert_eq!(record.type_one, "");
        assert!(!record.legendary);
    }

    #[test]
    fn normalize_reverts_only_the_bad_field() {
        let record = normalize(&raw(json!({
            "name": "Onix",
            "attack": -5,
            "defense": "160",
            "speed": 70.5,
            "hit_points": "lots",
            "legendary": "TRUE",
        })));

        assert_eq!(record.name, "Onix");
        assert_eq!(record.attack, 0);
        assert_eq!(record.defense, 160);
        assert_eq!(record.speed, 0);
        assert_eq!(record.hit_points, 0);
        assert!(record.legendary);
    }

    #[test]
    fn normalize_ignores_unknown_fields() {
        let record = normalize(&raw(json!({"name": "Ditto", "weight": 4, "shiny": true})));
        assert_eq!(record, Record { name: "Ditto".to_string(), ..Record::default() });
    }

    #[test]
    fn normalize_renders_scalars_into_text_fields() {
        let record = normalize(&raw(json!({"name": 151, "type_one": true, "type_two": ["x"]})));

        assert_eq!(record.name, "151");
        assert_eq!(record.type_one, "true");
        assert_eq!(record.type_two, "");
    }

    #[test]
    fn normalize_keeps_extreme_integers() {
        let record = normalize(&raw(json!({"number": u64::MAX, "total": "18446744073709551616"})));

        assert_eq!(record.number, u64::MAX);
        assert_eq!(record.total, 0);
    }
}
