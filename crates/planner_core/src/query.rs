//! crates/planner_core/src/query.rs
//!
//! The query model understood by every `DocumentStore` adapter: equality and
//! range filters composed with one sort field. Evaluation lives here so that
//! all adapters agree on the semantics.

use crate::document::Document;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        match (self.op, compare_values(actual, &self.value)) {
            (FilterOp::Eq, Some(Ordering::Equal)) => true,
            (FilterOp::Gte, Some(Ordering::Greater | Ordering::Equal)) => true,
            (FilterOp::Lte, Some(Ordering::Less | Ordering::Equal)) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// A filtered, optionally ordered read over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value.into())
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte, value.into())
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte, value.into())
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    fn filter(mut self, field: &str, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value,
        });
        self
    }

    /// True when the document passes every filter and carries the sort field.
    pub fn matches(&self, doc: &Document) -> bool {
        let has_sort_field = self
            .order_by
            .as_ref()
            .map_or(true, |order| doc.field(&order.field).is_some());
        has_sort_field && self.filters.iter().all(|f| f.matches(doc))
    }

    /// Filters and orders a full collection scan. The sort is stable, so
    /// documents with equal sort keys keep their incoming order.
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(order) = &self.order_by {
            selected.sort_by(|a, b| {
                let ord = match (a.field(&order.field), b.field(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
        selected
    }
}

/// What a live subscription watches: a query result or a single document.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchTarget {
    Query(Query),
    Document { collection: String, id: String },
}

impl WatchTarget {
    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        WatchTarget::Document {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            WatchTarget::Query(query) => &query.collection,
            WatchTarget::Document { collection, .. } => collection,
        }
    }
}

impl From<Query> for WatchTarget {
    fn from(query: Query) -> Self {
        WatchTarget::Query(query)
    }
}

/// Orders two JSON values of the same kind. Values of different kinds are
/// incomparable and never satisfy a filter.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn class(id: &str, date: &str) -> Document {
        Document::new(id, json!({ "date": date, "topic": id }))
    }

    #[test]
    fn range_filters_are_inclusive() {
        let query = Query::collection("classes")
            .where_gte("date", "2024-06-01")
            .where_lte("date", "2024-06-30")
            .order_by("date", Direction::Asc);
        let docs = vec![
            class("late", "2024-06-30"),
            class("before", "2024-05-31"),
            class("early", "2024-06-01"),
            class("after", "2024-07-01"),
        ];
        let ids: Vec<String> = query.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn equality_does_not_match_other_types() {
        let query = Query::collection("users").where_eq("role", "admin");
        assert!(query.matches(&Document::new("a", json!({ "role": "admin" }))));
        assert!(!query.matches(&Document::new("b", json!({ "role": 3 }))));
        assert!(!query.matches(&Document::new("c", json!({}))));
    }

    #[test]
    fn descending_order_and_missing_sort_field() {
        let query = Query::collection("users").order_by("createdAt", Direction::Desc);
        let docs = vec![
            Document::new("old", json!({ "createdAt": "2024-01-01T00:00:00Z" })),
            Document::new("none", json!({})),
            Document::new("new", json!({ "createdAt": "2024-02-01T00:00:00Z" })),
        ];
        let ids: Vec<String> = query.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(compare_values(&json!(9), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("9"), &json!(10)), None);
    }
}
