//! Native predicate evaluation for in-memory record filtering.
//!
//! A native predicate is a BSON document. Its top-level entries must all hold. `$and` and
//! `$or` take lists of predicates; any other key names a field, mapped either to a literal
//! (equality) or to an operator document such as `{ "$gt": 5, "$lte": 9 }`.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document, datetime::DateTime};

use doclink_core::{
    engine::{KEY_FIELD, RESERVED_PREFIX},
    error::{EngineError, EngineResult},
};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)`, `Int64(1)` and `Double(1.0)`
/// compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null or missing value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl<'a> Comparable<'a> {
    pub(crate) fn of(value: Option<&'a Bson>) -> Self {
        value.map(Comparable::from).unwrap_or(Comparable::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Bool(_) => 3,
            Comparable::DateTime(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }

    /// Total order used for sorting: values of the same kind compare naturally, values of
    /// different kinds are ordered by kind with null first. NaN sorts after every other number.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a
                .partial_cmp(b)
                .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())),
            _ => self
                .partial_cmp(other)
                .unwrap_or_else(|| self.rank().cmp(&other.rank())),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}


/// Evaluates native predicates against one physical record.
pub(crate) struct PredicateEvaluator<'a> {
    record: &'a Document,
}

impl<'a> PredicateEvaluator<'a> {
    pub fn new(record: &'a Document) -> Self {
        Self { record }
    }

    pub fn matches(&self, predicate: &Document) -> EngineResult<bool> {
        for (key, condition) in predicate {
            let holds = match key.as_str() {
                "$and" => {
                    let mut all = true;
                    for branch in Self::branches(key, condition)? {
                        if !self.matches(branch)? {
                            all = false;
                            break;
                        }
                    }
                    all
                },
                "$or" => {
                    let mut any = false;
                    for branch in Self::branches(key, condition)? {
                        if self.matches(branch)? {
                            any = true;
                            break;
                        }
                    }
                    any
                },
                field if field.starts_with(RESERVED_PREFIX) && field != KEY_FIELD => {
                    return Err(EngineError::InvalidPredicate(format!(
                        "operator {field} must be applied to a field"
                    )));
                },
                field => Self::field_matches(self.record.get(field), condition)?,
            };

            if !holds {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Filters records by a predicate; `None` keeps every record.
    pub fn filter_records<I>(records: I, predicate: Option<&Document>) -> EngineResult<Vec<&'a Document>>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched = Vec::new();

        for record in records {
            let keep = match predicate {
                Some(predicate) => PredicateEvaluator::new(record).matches(predicate)?,
                None => true,
            };

            if keep {
                matched.push(record);
            }
        }

        Ok(matched)
    }

    fn branches<'p>(op: &str, condition: &'p Bson) -> EngineResult<Vec<&'p Document>> {
        let invalid = || EngineError::InvalidPredicate(format!("{op} expects a list of predicates"));

        condition
            .as_array()
            .ok_or_else(invalid)?
            .iter()
            .map(|branch| branch.as_document().ok_or_else(invalid))
            .collect()
    }

    fn field_matches(value: Option<&Bson>, condition: &Bson) -> EngineResult<bool> {
        let operators = match condition {
            Bson::Document(doc) if is_operator_document(doc)? => doc,
            literal => return Ok(Comparable::of(value) == Comparable::from(literal)),
        };

        for (op, operand) in operators {
            if !Self::apply(op, value, operand)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn apply(op: &str, value: Option<&Bson>, operand: &Bson) -> EngineResult<bool> {
        let left = Comparable::of(value);

        Ok(match op {
            "$eq" => left == Comparable::from(operand),
            "$ne" => left != Comparable::from(operand),
            "$gt" | "$gte" | "$lt" | "$lte" => match (value, left.partial_cmp(&Comparable::from(operand))) {
                (Some(_), Some(ordering)) => match op {
                    "$gt" => ordering == Ordering::Greater,
                    "$gte" => ordering != Ordering::Less,
                    "$lt" => ordering == Ordering::Less,
                    _ => ordering != Ordering::Greater,
                },
                _ => false,
            },
            "$in" => Self::any_of(&left, Self::set(op, operand)?),
            "$nin" => !Self::any_of(&left, Self::set(op, operand)?),
            "$between" => match (value, Self::set(op, operand)?) {
                (Some(_), [low, high]) => {
                    matches!(
                        left.partial_cmp(&Comparable::from(low)),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(
                        left.partial_cmp(&Comparable::from(high)),
                        Some(Ordering::Less | Ordering::Equal)
                    )
                },
                (None, [_, _]) => false,
                _ => {
                    return Err(EngineError::InvalidPredicate(
                        "$between expects exactly two bounds".to_string(),
                    ));
                },
            },
            other => {
                return Err(EngineError::InvalidPredicate(format!("unknown operator {other}")));
            },
        })
    }

    fn set<'p>(op: &str, operand: &'p Bson) -> EngineResult<&'p [Bson]> {
        operand
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| EngineError::InvalidPredicate(format!("{op} expects a list of values")))
    }

    // An array-valued field matches when any of its items is in the set.
    fn any_of(left: &Comparable<'_>, values: &[Bson]) -> bool {
        let values = values.iter().map(Comparable::from).collect::<Vec<_>>();

        match left {
            Comparable::Array(items) => items.iter().any(|item| values.contains(item)),
            single => values.contains(single),
        }
    }
}

fn is_operator_document(doc: &Document) -> EngineResult<bool> {
    let operators = doc.keys().filter(|k| k.starts_with(RESERVED_PREFIX)).count();

    match operators {
        0 => Ok(false),
        n if n == doc.len() => Ok(true),
        _ => Err(EngineError::InvalidPredicate(
            "operators and plain fields cannot be mixed in one condition".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn record() -> Document {
        doc! { "$key": 3_i64, "name": "Alice", "age": 30, "tags": ["a", "b"], "score": 4.5 }
    }

    fn eval(predicate: Document) -> EngineResult<bool> {
        let record = record();
        PredicateEvaluator::new(&record).matches(&predicate)
    }

    #[test]
    fn literals_compare_for_equality() {
        assert!(eval(doc! { "name": "Alice", "age": 30_i64 }).unwrap());
        assert!(!eval(doc! { "name": "Bob" }).unwrap());
        assert!(eval(doc! { "$key": 3 }).unwrap());
    }

    #[test]
    fn comparison_operators() {
        assert!(eval(doc! { "age": { "$gt": 29, "$lt": 31 } }).unwrap());
        assert!(eval(doc! { "age": { "$gte": 30, "$lte": 30 } }).unwrap());
        assert!(!eval(doc! { "age": { "$lt": 30 } }).unwrap());
        assert!(!eval(doc! { "missing": { "$lte": 30 } }).unwrap());
        assert!(eval(doc! { "age": { "$ne": 31 } }).unwrap());
    }

    #[test]
    fn set_and_range_operators() {
        assert!(eval(doc! { "name": { "$in": ["Bob", "Alice"] } }).unwrap());
        assert!(eval(doc! { "name": { "$nin": ["Bob"] } }).unwrap());
        assert!(eval(doc! { "tags": { "$in": ["b"] } }).unwrap());
        assert!(eval(doc! { "missing": { "$nin": [1] } }).unwrap());
        assert!(eval(doc! { "score": { "$between": [4, 5] } }).unwrap());
        assert!(eval(doc! { "age": { "$between": [30, 30] } }).unwrap());
        assert!(!eval(doc! { "age": { "$between": [31, 40] } }).unwrap());
    }

    #[test]
    fn logical_operators() {
        assert!(eval(doc! { "$or": [{ "name": "Bob" }, { "age": 30 }] }).unwrap());
        assert!(!eval(doc! { "$and": [{ "name": "Alice" }, { "age": 31 }] }).unwrap());
        assert!(eval(doc! { "$and": [] }).unwrap());
        assert!(!eval(doc! { "$or": [] }).unwrap());
    }

    #[test]
    fn malformed_predicates_are_rejected() {
        assert!(matches!(eval(doc! { "$gt": 3 }), Err(EngineError::InvalidPredicate(_))));
        assert!(matches!(eval(doc! { "age": { "$like": 3 } }), Err(EngineError::InvalidPredicate(_))));
        assert!(matches!(eval(doc! { "age": { "$in": 3 } }), Err(EngineError::InvalidPredicate(_))));
        assert!(matches!(eval(doc! { "age": { "$between": [1] } }), Err(EngineError::InvalidPredicate(_))));
        assert!(matches!(eval(doc! { "$or": { "a": 1 } }), Err(EngineError::InvalidPredicate(_))));
        assert!(matches!(eval(doc! { "age": { "$gt": 1, "x": 2 } }), Err(EngineError::InvalidPredicate(_))));
    }

    #[test]
    fn sort_order_puts_nulls_first() {
        let null = Bson::Null;
        let one = Bson::Int32(1);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&one)), Ordering::Less);
        assert_eq!(Comparable::from(&one).sort_cmp(&Comparable::from(&text)), Ordering::Less);
        assert_eq!(Comparable::of(None).sort_cmp(&Comparable::from(&null)), Ordering::Equal);
    }

    #[test]
    fn sort_order_is_total_with_nan() {
        let nan_value = Bson::Double(f64::NAN);
        let neg_nan = Bson::Double(-f64::NAN);
        let big = Bson::Double(f64::INFINITY);
        let small = Bson::Int64(-3);

        let nan = Comparable::from(&nan_value);
        assert_eq!(nan.sort_cmp(&Comparable::from(&neg_nan)), Ordering::Equal);
        assert_eq!(nan.sort_cmp(&Comparable::from(&big)), Ordering::Greater);
        assert_eq!(Comparable::from(&small).sort_cmp(&nan), Ordering::Less);
        assert_eq!(Comparable::from(&neg_nan).sort_cmp(&Comparable::from(&small)), Ordering::Greater);
    }
}
