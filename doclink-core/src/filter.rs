//! Abstract "where" filters as sent by the data-access framework.
//!
//! A framework filter is a mapping whose keys are either logical operators (`and`, `or`,
//! `inq`, `gt`, ...) or field names, each mapped to a scalar, a list, or another filter.
//! This module parses that dynamic shape once into a tagged tree so later stages can match
//! on it instead of inspecting BSON types again.
//!
//! # Example
//!
//! ```ignore
//! use doclink_core::filter::Filter;
//! use bson::doc;
//!
//! let filter = Filter::parse(&doc! {
//!     "or": [
//!         { "name": "Alice" },
//!         { "age": { "gt": 18 } },
//!     ],
//! });
//!
//! assert_eq!(filter.clauses().len(), 1);
//! ```

use bson::{Bson, Document};
use std::fmt;

/// Logical operators recognized in framework filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// All sub-conditions must match (`and`).
    And,
    /// Any sub-condition must match (`or`).
    Or,
    /// No sub-condition may match (`nor`). Recognized, but has no native equivalent.
    Nor,
    /// Value is one of a set (`inq`).
    InSet,
    /// Value is none of a set (`nin`).
    NotInSet,
    /// Value lies within an inclusive range (`between`).
    Between,
    /// Greater than (`gt`).
    GreaterThan,
    /// Greater than or equal to (`gte`).
    GreaterOrEqual,
    /// Less than (`lt`).
    LessThan,
}

impl Operator {
    /// Every recognized operator.
    pub const ALL: [Operator; 9] = [
        Operator::And,
        Operator::Or,
        Operator::Nor,
        Operator::InSet,
        Operator::NotInSet,
        Operator::Between,
        Operator::GreaterThan,
        Operator::GreaterOrEqual,
        Operator::LessThan,
    ];

    /// Looks up the operator spelled `key` in a framework filter.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == key)
    }

    /// The framework spelling of this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Nor => "nor",
            Operator::InSet => "inq",
            Operator::NotInSet => "nin",
            Operator::Between => "between",
            Operator::GreaterThan => "gt",
            Operator::GreaterOrEqual => "gte",
            Operator::LessThan => "lt",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The key of a single filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseKey {
    /// A logical operator.
    Operator(Operator),
    /// A plain field name.
    Field(String),
}

/// The right-hand side of a filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A scalar value (string, number, boolean, null, date, ...).
    Value(Bson),
    /// A list of operands, e.g. the branches of an `or` or the members of an `inq`.
    List(Vec<Operand>),
    /// A nested filter.
    Filter(Filter),
}

impl Operand {
    /// Parses a BSON value into an operand.
    pub fn parse(value: &Bson) -> Self {
        match value {
            Bson::Document(doc) => Operand::Filter(Filter::parse(doc)),
            Bson::Array(items) => Operand::List(items.iter().map(Operand::parse).collect()),
            other => Operand::Value(other.clone()),
        }
    }

    /// Wraps any BSON-convertible value, parsing documents and arrays into their tree form.
    pub fn value(value: impl Into<Bson>) -> Self {
        Operand::parse(&value.into())
    }
}

impl From<Bson> for Operand {
    fn from(value: Bson) -> Self {
        Operand::parse(&value)
    }
}

/// A single `key: operand` entry of a filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// The operator or field name.
    pub key: ClauseKey,
    /// The condition value.
    pub operand: Operand,
}

/// A parsed framework filter: an unordered set of clauses that must all hold.
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a framework filter document.
    pub fn parse(document: &Document) -> Self {
        Self {
            clauses: document
                .iter()
                .map(|(key, value)| Clause {
                    key: match Operator::from_key(key) {
                        Some(op) => ClauseKey::Operator(op),
                        None => ClauseKey::Field(key.clone()),
                    },
                    operand: Operand::parse(value),
                })
                .collect(),
        }
    }

    /// Returns `true` if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The clauses of this filter, in input order.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Adds a field condition.
    pub fn field(mut self, name: impl Into<String>, operand: impl Into<Operand>) -> Self {
        self.clauses.push(Clause {
            key: ClauseKey::Field(name.into()),
            operand: operand.into(),
        });
        self
    }

    /// Adds an operator clause.
    pub fn operator(mut self, op: Operator, operand: impl Into<Operand>) -> Self {
        self.clauses.push(Clause { key: ClauseKey::Operator(op), operand: operand.into() });
        self
    }

    /// Creates a filter matching records whose `field` equals `value`.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::new().field(field, Operand::Value(value.into()))
    }

    /// Creates a filter requiring all of the given filters to match.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::new().operator(
            Operator::And,
            Operand::List(filters.into_iter().map(Operand::Filter).collect()),
        )
    }

    /// Creates a filter requiring any of the given filters to match.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::new().operator(
            Operator::Or,
            Operand::List(filters.into_iter().map(Operand::Filter).collect()),
        )
    }
}

impl From<&Document> for Filter {
    fn from(document: &Document) -> Self {
        Filter::parse(document)
    }
}

impl From<Document> for Filter {
    fn from(document: Document) -> Self {
        Filter::parse(&document)
    }
}

impl From<Filter> for Operand {
    fn from(filter: Filter) -> Self {
        Operand::Filter(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn operator_keys_are_recognized() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_key(op.as_str()), Some(op));
        }
        assert_eq!(Operator::from_key("lte"), None);
        assert_eq!(Operator::from_key("name"), None);
    }

    #[test]
    fn parse_builds_a_tagged_tree() {
        let filter = Filter::parse(&doc! {
            "name": "Alice",
            "or": [{ "age": { "gt": 18 } }, { "vip": true }],
        });

        assert_eq!(filter.clauses().len(), 2);
        assert_eq!(filter.clauses()[0].key, ClauseKey::Field("name".into()));
        assert_eq!(filter.clauses()[0].operand, Operand::Value(Bson::String("Alice".into())));

        let Operand::List(branches) = &filter.clauses()[1].operand else {
            panic!("expected a list operand");
        };
        assert_eq!(filter.clauses()[1].key, ClauseKey::Operator(Operator::Or));
        assert_eq!(
            branches[0],
            Operand::Filter(Filter::new().field(
                "age",
                Filter::new().operator(Operator::GreaterThan, Operand::value(18)),
            ))
        );
    }

    #[test]
    fn empty_document_is_an_empty_filter() {
        assert!(Filter::parse(&doc! {}).is_empty());
    }

    #[test]
    fn helpers_match_parsed_documents() {
        let built = Filter::or([Filter::eq("name", "a"), Filter::eq("name", "b")]);
        let parsed = Filter::parse(&doc! { "or": [{ "name": "a" }, { "name": "b" }] });

        assert_eq!(built, parsed);
    }
}
