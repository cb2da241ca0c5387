//! Declarative routing rules.
//!
//! A rule pairs a destination URL and a reason with a list of predicates of
//! the form `<field><op><value>`. All predicates must hold for the rule to
//! match; an empty list matches everything. Rules are evaluated in the order
//! they were declared.
//!
//! Predicates are compiled when the rule is built. A predicate that fails to
//! compile (no operator, empty side, unknown field, unusable literal) is kept
//! alongside its error and evaluates as a non-match, so a bad rule can never
//! fail the surrounding request.
//!
//! # Example
//!
//! ```
//! use pokeproxy_core::{
//!     models::Record,
//!     rules::{all_matches, first_match, Rule},
//! };
//!
//! let rules = vec![
//!     Rule::new("http://strong.example", "strong", ["attack>100"]),
//!     Rule::new("http://fire.example", "fire", ["type_one==Fire"]),
//!     Rule::new("http://all.example", "catch-all", Vec::<String>::new()),
//! ];
//! let record = Record { type_one: "Fire".into(), attack: 84, ..Record::default() };
//!
//! assert_eq!(first_match(&record, &rules).map(|r| r.reason()), Some("fire"));
//! assert_eq!(all_matches(&record, &rules).len(), 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Field, FieldKind, FieldValue, Record};

/// Comparison operators, listed in parse priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
}

impl Operator {
    /// Operators in the order the parser looks for them.
    pub const PRIORITY: [Self; 4] = [Self::Equal, Self::NotEqual, Self::GreaterThan, Self::LessThan];

    /// Source token of the operator.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
        }
    }

    /// Compares a record value against a literal.
    ///
    /// Numbers compare numerically, integers and floats mixed freely. Text
    /// and booleans support only `==` and `!=`; ordering them is a non-match.
    /// Operands of different kinds are never equal.
    pub fn evaluate(self, actual: FieldValue<'_>, expected: &Literal) -> bool {
        match (actual, expected) {
            (FieldValue::Integer(a), Literal::Integer(b)) => self.apply(a.cmp(b)),
            #[allow(clippy::cast_precision_loss)]
            (FieldValue::Integer(a), Literal::Float(b)) => {
                (a as f64).partial_cmp(b).is_some_and(|ordering| self.apply(ordering))
            },
            (FieldValue::Text(a), Literal::Text(b)) => self.apply_equality(a == b),
            (FieldValue::Boolean(a), Literal::Boolean(b)) => self.apply_equality(a == *b),
            _ => self.apply_equality(false),
        }
    }

    fn apply(self, ordering: std::cmp::Ordering) -> bool {
        match self {
            Self::Equal => ordering.is_eq(),
            Self::NotEqual => ordering.is_ne(),
            Self::GreaterThan => ordering.is_gt(),
            Self::LessThan => ordering.is_lt(),
        }
    }

    fn apply_equality(self, equal: bool) -> bool {
        match self {
            Self::Equal => equal,
            Self::NotEqual => !equal,
            Self::GreaterThan | Self::LessThan => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Right-hand side of a predicate, coerced to the field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// All-digit literal compared against an integer field.
    Integer(u64),
    /// Any other numeric literal compared against an integer field.
    Float(f64),
    /// Literal compared against a text field.
    Text(String),
    /// `true` (case-insensitive) or anything else, against a boolean field.
    Boolean(bool),
}

impl Literal {
    /// Coerces raw predicate text to the type of `field`.
    ///
    /// # Errors
    ///
    /// Returns `PredicateError::InvalidLiteral` when an integer field is
    /// compared against text that is not a number.
    pub fn coerce(field: Field, value: &str) -> Result<Self, PredicateError> {
        match field.kind() {
            FieldKind::Boolean => Ok(Self::Boolean(value.eq_ignore_ascii_case("true"))),
            FieldKind::Text => Ok(Self::Text(value.to_string())),
            FieldKind::Integer => {
                if value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(n) = value.parse::<u64>() {
                        return Ok(Self::Integer(n));
                    }
                }
                value
                    .parse::<f64>()
                    .ok()
                    .filter(|n| !n.is_nan())
                    .map(Self::Float)
                    .ok_or_else(|| PredicateError::InvalidLiteral {
                        field,
                        value: value.to_string(),
                    })
            },
        }
    }
}

/// Reasons a predicate string cannot be used.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    /// None of `==`, `!=`, `>`, `<` appears in the predicate.
    #[error("no operator (==, !=, >, <) in predicate '{0}'")]
    MissingOperator(String),

    /// Nothing before the operator.
    #[error("empty field name in predicate '{0}'")]
    EmptyField(String),

    /// Nothing after the operator.
    #[error("empty value in predicate '{0}'")]
    EmptyValue(String),

    /// The field is not part of the record.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The value cannot be compared against the field.
    #[error("value '{value}' is not comparable with numeric field '{field}'")]
    InvalidLiteral {
        /// Field being compared.
        field: Field,
        /// Offending literal.
        value: String,
    },
}

/// Splits a predicate into trimmed `(field, operator, value)`.
///
/// Operators are searched in `Operator::PRIORITY` order and the predicate is
/// split at the first occurrence of the first one present. Two-character
/// operators are matched as whole tokens, so `type_two!=word` splits on `!=`.
///
/// # Errors
///
/// Returns an error when no operator is present or either side is empty
/// after trimming.
pub fn parse_predicate(source: &str) -> Result<(&str, Operator, &str), PredicateError> {
    let (op, at) = Operator::PRIORITY
        .into_iter()
        .find_map(|op| source.find(op.token()).map(|at| (op, at)))
        .ok_or_else(|| PredicateError::MissingOperator(source.to_string()))?;

    let field = source[..at].trim();
    let value = source[at + op.token().len()..].trim();

    if field.is_empty() {
        return Err(PredicateError::EmptyField(source.to_string()));
    }
    if value.is_empty() {
        return Err(PredicateError::EmptyValue(source.to_string()));
    }

    Ok((field, op, value))
}

/// A compiled predicate bound to a record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field read from the record.
    pub field: Field,
    /// Comparison applied.
    pub op: Operator,
    /// Coerced right-hand side.
    pub literal: Literal,
}

impl Predicate {
    /// Parses and type-checks a predicate string.
    ///
    /// # Errors
    ///
    /// Returns a `PredicateError` for malformed text, unknown fields, and
    /// literals that cannot be compared against the field.
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        let (name, op, value) = parse_predicate(source)?;
        let field: Field =
            name.parse().map_err(|_| PredicateError::UnknownField(name.to_string()))?;
        let literal = Literal::coerce(field, value)?;
        Ok(Self { field, op, literal })
    }

    /// Evaluates the predicate against a record.
    pub fn matches(&self, record: &Record) -> bool {
        self.op.evaluate(record.get(self.field), &self.literal)
    }
}

/// Predicate source text and the result of compiling it.
#[derive(Debug, Clone, PartialEq)]
struct Condition {
    source: String,
    compiled: Result<Predicate, PredicateError>,
}

impl Condition {
    fn new(source: String) -> Self {
        let compiled = Predicate::compile(&source);
        Self { source, compiled }
    }

    fn matches(&self, record: &Record) -> bool {
        match &self.compiled {
            Ok(predicate) => predicate.matches(record),
            Err(e) => {
                warn!(predicate = %self.source, error = %e, "Skipping unusable predicate");
                false
            },
        }
    }
}

/// Rule as written in the rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Destination URL.
    pub url: String,
    /// Reason forwarded with each delivery.
    pub reason: String,
    /// Predicate strings, all of which must hold.
    #[serde(default, rename = "match")]
    pub match_rules: Vec<String>,
}

/// A routing rule: destination, reason and conjunctive predicates.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    url: String,
    reason: String,
    conditions: Vec<Condition>,
}

impl Rule {
    /// Builds a rule, compiling each predicate.
    pub fn new<I, S>(url: impl Into<String>, reason: impl Into<String>, predicates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: url.into(),
            reason: reason.into(),
            conditions: predicates.into_iter().map(|p| Condition::new(p.into())).collect(),
        }
    }

    /// Destination URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Reason forwarded with each delivery.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Predicate source strings in declared order.
    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(|c| c.source.as_str())
    }

    /// Compile errors for predicates that will never match.
    pub fn errors(&self) -> impl Iterator<Item = &PredicateError> {
        self.conditions.iter().filter_map(|c| c.compiled.as_ref().err())
    }

    /// Whether every predicate holds for `record`.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl From<RuleConfig> for Rule {
    fn from(config: RuleConfig) -> Self {
        Self::new(config.url, config.reason, config.match_rules)
    }
}

/// Returns the first rule, in list order, that matches `record`.
pub fn first_match<'a>(record: &Record, rules: &'a [Rule]) -> Option<&'a Rule> {
    rules.iter().find(|rule| rule.matches(record))
}

/// Returns every rule that matches `record`, preserving list order.
pub fn all_matches<'a>(record: &Record, rules: &'a [Rule]) -> Vec<&'a Rule> {
    rules.iter().filter(|rule| rule.matches(record)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_operator() {
        assert_eq!(parse_predicate("attack>80"), Ok(("attack", Operator::GreaterThan, "80")));
        assert_eq!(parse_predicate("hit_points==20"), Ok(("hit_points", Operator::Equal, "20")));
        assert_eq!(parse_predicate("type_two!=word"), Ok(("type_two", Operator::NotEqual, "word")));
        assert_eq!(
            parse_predicate("special_defense > 10"),
            Ok(("special_defense", Operator::GreaterThan, "10"))
        );
        assert_eq!(parse_predicate("generation< 20"), Ok(("generation", Operator::LessThan, "20")));
    }

    #[test]
    fn parse_prefers_higher_priority_operator() {
        // `==` wins even though `>` appears first.
        assert_eq!(parse_predicate("a>b==c"), Ok(("a>b", Operator::Equal, "c")));
        // `!=` is one token, not `!` followed by `=`.
        assert_eq!(parse_predicate("name!=Mew"), Ok(("name", Operator::NotEqual, "Mew")));
    }

    #[test]
    fn parse_rejects_malformed_predicates() {
        assert!(matches!(parse_predicate("attack"), Err(PredicateError::MissingOperator(_))));
        assert!(matches!(parse_predicate("attack = 5"), Err(PredicateError::MissingOperator(_))));
        assert!(matches!(parse_predicate("==value"), Err(PredicateError::EmptyField(_))));
        assert!(matches!(parse_predicate("field=="), Err(PredicateError::EmptyValue(_))));
        assert!(matches!(parse_predicate("  <  "), Err(PredicateError::EmptyField(_))));
    }

    #[test]
    fn evaluate_integers() {
        let five = FieldValue::Integer(5);
        let ten = FieldValue::Integer(10);

        assert!(Operator::Equal.evaluate(five, &Literal::Integer(5)));
        assert!(!Operator::Equal.evaluate(five, &Literal::Integer(10)));
        assert!(!Operator::NotEqual.evaluate(five, &Literal::Integer(5)));
        assert!(Operator::NotEqual.evaluate(five, &Literal::Integer(10)));
        assert!(Operator::GreaterThan.evaluate(ten, &Literal::Integer(5)));
        assert!(!Operator::GreaterThan.evaluate(five, &Literal::Integer(10)));
        assert!(Operator::LessThan.evaluate(five, &Literal::Integer(10)));
        assert!(!Operator::LessThan.evaluate(ten, &Literal::Integer(5)));
    }

    #[test]
    fn evaluate_mixed_numeric() {
        assert!(Operator::GreaterThan.evaluate(FieldValue::Integer(10), &Literal::Float(9.5)));
        assert!(Operator::LessThan.evaluate(FieldValue::Integer(0), &Literal::Float(0.5)));
        assert!(Operator::GreaterThan.evaluate(FieldValue::Integer(0), &Literal::Float(-1.5)));
        assert!(!Operator::Equal.evaluate(FieldValue::Integer(10), &Literal::Float(10.1)));
    }

    #[test]
    fn evaluate_text_and_boolean_equality_only() {
        let fire = FieldValue::Text("fire");
        assert!(Operator::Equal.evaluate(fire, &Literal::Text("fire".into())));
        assert!(Operator::NotEqual.evaluate(fire, &Literal::Text("water".into())));
        assert!(!Operator::GreaterThan.evaluate(fire, &Literal::Text("earth".into())));
        assert!(!Operator::LessThan.evaluate(fire, &Literal::Text("water".into())));

        let legendary = FieldValue::Boolean(true);
        assert!(Operator::Equal.evaluate(legendary, &Literal::Boolean(true)));
        assert!(Operator::NotEqual.evaluate(FieldValue::Boolean(false), &Literal::Boolean(true)));
        assert!(!Operator::GreaterThan.evaluate(legendary, &Literal::Boolean(false)));
    }

    #[test]
    fn evaluate_mismatched_kinds_is_never_equal() {
        assert!(!Operator::Equal.evaluate(FieldValue::Integer(1), &Literal::Text("1".into())));
        assert!(Operator::NotEqual.evaluate(FieldValue::Text("1"), &Literal::Integer(1)));
        assert!(!Operator::LessThan.evaluate(FieldValue::Boolean(true), &Literal::Integer(1)));
    }

    #[test]
    fn literal_coercion_follows_field_type() {
        assert_eq!(Literal::coerce(Field::Legendary, "TRUE"), Ok(Literal::Boolean(true)));
        assert_eq!(Literal::coerce(Field::Legendary, "yes"), Ok(Literal::Boolean(false)));
        assert_eq!(Literal::coerce(Field::Attack, "80"), Ok(Literal::Integer(80)));
        assert_eq!(Literal::coerce(Field::Attack, "80.5"), Ok(Literal::Float(80.5)));
        assert_eq!(Literal::coerce(Field::Name, "80"), Ok(Literal::Text("80".into())));
        assert!(matches!(
            Literal::coerce(Field::Attack, "high"),
            Err(PredicateError::InvalidLiteral { field: Field::Attack, .. })
        ));
    }

    #[test]
    fn compile_rejects_unknown_field() {
        assert_eq!(
            Predicate::compile("weight>10"),
            Err(PredicateError::UnknownField("weight".into()))
        );
    }

    #[test]
    fn empty_rule_matches_everything() {
        let rule = Rule::new("http://example.com", "test", Vec::<String>::new());
        assert!(rule.matches(&Record::default()));
    }

    #[test]
    fn single_boolean_condition() {
        let rule = Rule::new("http://example.com", "test", ["legendary==true"]);

        assert!(rule.matches(&Record { legendary: true, ..Record::default() }));
        assert!(!rule.matches(&Record { legendary: false, ..Record::default() }));
    }

    #[test]
    fn conditions_are_conjunctive() {
        let rule = Rule::new("http://example.com", "test", [
            "hit_points>50",
            "attack>70",
            "type_one==Fire",
        ]);

        let strong = Record {
            hit_points: 60,
            attack: 80,
            type_one: "Fire".into(),
            ..Record::default()
        };
        let weak = Record { attack: 60, ..strong.clone() };
        let other = Record { hit_points: 40, attack: 60, type_one: "Water".into(), ..strong.clone() };

        assert!(rule.matches(&strong));
        assert!(!rule.matches(&weak));
        assert!(!rule.matches(&other));
    }

    #[test]
    fn invalid_predicate_is_a_non_match_not_a_failure() {
        let rule = Rule::new("http://example.com", "test", ["attack>>", "speed>1"]);
        let record = Record { speed: 100, attack: 100, ..Record::default() };

        assert!(!rule.matches(&record));
        assert_eq!(rule.errors().count(), 1);
    }

    #[test]
    fn first_and_all_matches_respect_order() {
        let rules = vec![
            Rule::new("http://a", "A", ["attack>200"]),
            Rule::new("http://b", "B", ["attack>50"]),
            Rule::new("http://c", "C", Vec::<String>::new()),
        ];
        let record = Record { attack: 100, ..Record::default() };

        assert_eq!(first_match(&record, &rules).map(Rule::url), Some("http://b"));
        let all: Vec<&str> = all_matches(&record, &rules).into_iter().map(Rule::reason).collect();
        assert_eq!(all, ["B", "C"]);
    }

    #[test]
    fn no_rules_match() {
        let rules = vec![Rule::new("http://a", "A", ["legendary==true"])];

        assert!(first_match(&Record::default(), &rules).is_none());
        assert!(all_matches(&Record::default(), &rules).is_empty());
    }

    #[test]
    fn rule_config_uses_match_key() {
        let config: RuleConfig = serde_json::from_str(
            r#"{"url": "http://a", "reason": "fire", "match": ["type_one==Fire"]}"#,
        )
        .unwrap();
        let rule = Rule::from(config);

        assert_eq!(rule.predicates().collect::<Vec<_>>(), ["type_one==Fire"]);

        let bare: RuleConfig =
            serde_json::from_str(r#"{"url": "http://a", "reason": "all"}"#).unwrap();
        assert!(bare.match_rules.is_empty());
    }
}
