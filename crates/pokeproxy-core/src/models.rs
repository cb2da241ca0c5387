//! Domain model for routed records.
//!
//! A `Record` is the typed, normalized form of an inbound payload. Rule
//! predicates never touch record fields by name at evaluation time; they go
//! through the closed `Field` enumeration, resolved once when a rule is
//! built.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A creature stat block, the unit of routing.
///
/// Every field has a zero or empty default. Records are built fresh for each
/// inbound request and are read-only afterwards.
///
/// # Example
///
/// ```
/// use pokeproxy_core::models::{Field, FieldValue, Record};
///
/// let record = Record { name: "Charizard".to_string(), attack: 84, ..Record::default() };
/// assert_eq!(record.get(Field::Attack), FieldValue::Integer(84));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    /// National index number.
    pub number: u64,
    /// Display name.
    pub name: String,
    /// Primary type.
    pub type_one: String,
    /// Secondary type, empty when the creature has only one.
    pub type_two: String,
    /// Sum of base stats.
    pub total: u64,
    /// Base hit points.
    pub hit_points: u64,
    /// Base attack.
    pub attack: u64,
    /// Base defense.
    pub defense: u64,
    /// Base special attack.
    pub special_attack: u64,
    /// Base special defense.
    pub special_defense: u64,
    /// Base speed.
    pub speed: u64,
    /// Generation the creature was introduced in.
    pub generation: u64,
    /// Whether the creature is legendary.
    pub legendary: bool,
}

impl Record {
    /// Reads a field through the closed field enumeration.
    pub fn get(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Number => FieldValue::Integer(self.number),
            Field::Name => FieldValue::Text(&self.name),
            Field::TypeOne => FieldValue::Text(&self.type_one),
            Field::TypeTwo => FieldValue::Text(&self.type_two),
            Field::Total => FieldValue::Integer(self.total),
            Field::HitPoints => FieldValue::Integer(self.hit_points),
            Field::Attack => FieldValue::Integer(self.attack),
            Field::Defense => FieldValue::Integer(self.defense),
            Field::SpecialAttack => FieldValue::Integer(self.special_attack),
            Field::SpecialDefense => FieldValue::Integer(self.special_defense),
            Field::Speed => FieldValue::Integer(self.speed),
            Field::Generation => FieldValue::Integer(self.generation),
            Field::Legendary => FieldValue::Boolean(self.legendary),
        }
    }
}

/// Names of the fields a predicate may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `number`
    Number,
    /// `name`
    Name,
    /// `type_one`
    TypeOne,
    /// `type_two`
    TypeTwo,
    /// `total`
    Total,
    /// `hit_points`
    HitPoints,
    /// `attack`
    Attack,
    /// `defense`
    Defense,
    /// `special_attack`
    SpecialAttack,
    /// `special_defense`
    SpecialDefense,
    /// `speed`
    Speed,
    /// `generation`
    Generation,
    /// `legendary`
    Legendary,
}

impl Field {
    /// All fields in wire order.
    pub const ALL: [Self; 13] = [
        Self::Number,
        Self::Name,
        Self::TypeOne,
        Self::TypeTwo,
        Self::Total,
        Self::HitPoints,
        Self::Attack,
        Self::Defense,
        Self::SpecialAttack,
        Self::SpecialDefense,
        Self::Speed,
        Self::Generation,
        Self::Legendary,
    ];

    /// Field name as it appears in payloads and predicates.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Name => "name",
            Self::TypeOne => "type_one",
            Self::TypeTwo => "type_two",
            Self::Total => "total",
            Self::HitPoints => "hit_points",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::SpecialAttack => "special_attack",
            Self::SpecialDefense => "special_defense",
            Self::Speed => "speed",
            Self::Generation => "generation",
            Self::Legendary => "legendary",
        }
    }

    /// Declared type of the field.
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Name | Self::TypeOne | Self::TypeTwo => FieldKind::Text,
            Self::Legendary => FieldKind::Boolean,
            Self::Number
            | Self::Total
            | Self::HitPoints
            | Self::Attack
            | Self::Defense
            | Self::SpecialAttack
            | Self::SpecialDefense
            | Self::Speed
            | Self::Generation => FieldKind::Integer,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a name does not correspond to any record field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown record field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Declared type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-negative integer.
    Integer,
    /// UTF-8 string.
    Text,
    /// Boolean flag.
    Boolean,
}

/// Borrowed value of a single record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// Integer field value.
    Integer(u64),
    /// String field value.
    Text(&'a str),
    /// Boolean field value.
    Boolean(bool),
}
