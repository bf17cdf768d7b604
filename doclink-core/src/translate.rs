//! Translation of framework filters into native engine predicates.
//!
//! The translator walks a parsed [`Filter`] and produces a BSON document in the engine's
//! native query syntax: operator keys are renamed to `$`-prefixed engine tokens and the
//! model's identifier field is renamed to the surrogate-key field, with every identifier
//! value coerced to an engine key on the way.
//!
//! | framework | native                                    |
//! |-----------|-------------------------------------------|
//! | `and`     | `$and`                                    |
//! | `or`      | `$or`                                     |
//! | `inq`     | `$in`                                     |
//! | `nin`     | `$nin`                                    |
//! | `between` | `$between`                                |
//! | `gt`      | `$gt`                                     |
//! | `gte`     | `$gte`                                    |
//! | `lt`      | `$lte`, or `$lt` with [`LessThanMapping::Strict`] |
//! | `nor`     | rejected with [`ConnectorError::UnsupportedOperator`] |

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::{
    engine::KEY_FIELD,
    error::{ConnectorError, ConnectorResult},
    filter::{ClauseKey, Filter, Operand, Operator},
    identifier::coerce_id,
};

/// Native operator emitted for the framework's `lt`.
///
/// Historically `lt` has been sent to the engine as a less-or-equal comparison, and
/// existing data sets may rely on that. `Strict` emits a true less-than instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessThanMapping {
    /// `lt` becomes `$lte`.
    #[default]
    Inclusive,
    /// `lt` becomes `$lt`.
    Strict,
}

/// Options controlling filter translation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateOptions {
    /// How the framework's `lt` operator is mapped.
    #[serde(default)]
    pub less_than: LessThanMapping,
}

/// Translates framework filters of one model into native predicates.
#[derive(Debug, Clone, Copy)]
pub struct PredicateTranslator<'a> {
    id_field: &'a str,
    options: TranslateOptions,
}

impl<'a> PredicateTranslator<'a> {
    /// Creates a translator for a model whose identifier field is `id_field`.
    pub fn new(id_field: &'a str, options: TranslateOptions) -> Self {
        Self { id_field, options }
    }

    /// Returns the native token for a framework operator.
    pub fn native_operator(&self, op: Operator) -> ConnectorResult<&'static str> {
        Ok(match op {
            Operator::And => "$and",
            Operator::Or => "$or",
            Operator::InSet => "$in",
            Operator::NotInSet => "$nin",
            Operator::Between => "$between",
            Operator::GreaterThan => "$gt",
            Operator::GreaterOrEqual => "$gte",
            Operator::LessThan => match self.options.less_than {
                LessThanMapping::Inclusive => "$lte",
                LessThanMapping::Strict => "$lt",
            },
            Operator::Nor => {
                return Err(ConnectorError::UnsupportedOperator(op.to_string()));
            }
        })
    }

    /// Translates a filter. An empty filter yields `None`, meaning "match all".
    pub fn translate(&self, filter: &Filter) -> ConnectorResult<Option<Document>> {
        if filter.is_empty() {
            return Ok(None);
        }

        Ok(Some(self.visit_filter(filter, false)?))
    }

    fn visit_filter(&self, filter: &Filter, parsing_ids: bool) -> ConnectorResult<Document> {
        let mut native = Document::new();

        for clause in filter.clauses() {
            match &clause.key {
                ClauseKey::Operator(op) => {
                    let token = self.native_operator(*op)?;
                    native.insert(token, self.visit_operand(&clause.operand, parsing_ids)?);
                }
                ClauseKey::Field(field) if field == self.id_field => {
                    native.insert(KEY_FIELD, self.visit_operand(&clause.operand, true)?);
                }
                ClauseKey::Field(field) => {
                    native.insert(field.as_str(), self.visit_operand(&clause.operand, parsing_ids)?);
                }
            }
        }

        Ok(native)
    }

    fn visit_operand(&self, operand: &Operand, parsing_ids: bool) -> ConnectorResult<Bson> {
        Ok(match operand {
            Operand::List(items) => Bson::Array(
                items
                    .iter()
                    .map(|item| self.visit_operand(item, parsing_ids))
                    .collect::<ConnectorResult<Vec<_>>>()?,
            ),
            Operand::Value(value) if parsing_ids => Bson::Int64(coerce_id(value)?),
            Operand::Value(value) => value.clone(),
            Operand::Filter(filter) => Bson::Document(self.visit_filter(filter, parsing_ids)?),
        })
    }
}

/// Translates `filter` for a model whose identifier field is `id_field`.
///
/// Shorthand for [`PredicateTranslator::translate`].
pub fn translate(
    filter: &Filter,
    id_field: &str,
    options: TranslateOptions,
) -> ConnectorResult<Option<Document>> {
    PredicateTranslator::new(id_field, options).translate(filter)
}
