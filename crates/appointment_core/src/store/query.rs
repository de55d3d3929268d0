//! Engine-neutral filter and ordering description.
//!
//! # Responsibility
//! - Let the repository express filters without writing statement text.
//! - Own the single "contains, case-insensitive" matching rule.
//!
//! # Invariants
//! - Column names are static identifiers; user input only ever travels as
//!   `FieldValue` or needle strings, which storage binds as parameters.

use super::{Entity, EntityKind, FieldValue};

/// Sort direction for one ordering term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Boolean filter over one entity's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `column = value`.
    Eq {
        column: &'static str,
        value: FieldValue,
    },
    /// `column` contains `needle` after Unicode lowercasing of both. Wildcards in
    /// `needle` are literal.
    Contains {
        column: &'static str,
        needle: String,
    },
    /// `low <= column <= high`.
    Between {
        column: &'static str,
        low: FieldValue,
        high: FieldValue,
    },
    /// `column` references a row of `target` that satisfies `predicate`.
    Related {
        column: &'static str,
        target: EntityKind,
        predicate: Box<Predicate>,
    },
    /// Every nested predicate holds.
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl Into<FieldValue>) -> Self {
        Self::Eq {
            column,
            value: value.into(),
        }
    }

    pub fn contains_ignore_case(column: &'static str, needle: impl Into<String>) -> Self {
        Self::Contains {
            column,
            needle: needle.into(),
        }
    }

    pub fn between(
        column: &'static str,
        low: impl Into<FieldValue>,
        high: impl Into<FieldValue>,
    ) -> Self {
        Self::Between {
            column,
            low: low.into(),
            high: high.into(),
        }
    }

    /// Matches rows whose `column` points at an `E` row matching `predicate`.
    pub fn related<E: Entity>(column: &'static str, predicate: Predicate) -> Self {
        Self::Related {
            column,
            target: E::KIND,
            predicate: Box::new(predicate),
        }
    }

    /// Conjunction; nested conjunctions are flattened.
    pub fn and(self, other: Predicate) -> Self {
        let mut terms = match self {
            Self::All(terms) => terms,
            single => vec![single],
        };
        match other {
            Self::All(more) => terms.extend(more),
            single => terms.push(single),
        }
        Self::All(terms)
    }
}

/// Filter plus ordering for `Storage::query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    predicate: Option<Predicate>,
    order: Vec<(&'static str, Direction)>,
}

impl Query {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Matches rows satisfying `predicate`.
    pub fn filter(predicate: Predicate) -> Self {
        Self {
            predicate: Some(predicate),
            order: Vec::new(),
        }
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub fn ordering(&self) -> &[(&'static str, Direction)] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::{Direction, Predicate, Query};
    use crate::store::FieldValue;

    #[test]
    fn and_flattens_nested_conjunctions() {
        let combined = Predicate::eq("a", 1_i64)
            .and(Predicate::between("b", 0_i64, 9_i64))
            .and(Predicate::contains_ignore_case("c", "x"));

        match combined {
            Predicate::All(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }
    }

    #[test]
    fn query_keeps_ordering_terms_in_call_order() {
        let query = Query::filter(Predicate::eq("kind", "doctor"))
            .order_by("lastname", Direction::Asc)
            .order_by("firstname", Direction::Desc);

        assert_eq!(
            query.ordering(),
            &[("lastname", Direction::Asc), ("firstname", Direction::Desc)]
        );
        assert_eq!(
            query.predicate(),
            Some(&Predicate::Eq {
                column: "kind",
                value: FieldValue::Text("doctor".to_string()),
            })
        );
    }

    #[test]
    fn all_has_no_predicate() {
        assert!(Query::all().predicate().is_none());
    }
}
