//! Embedded `where` / `order_by` / `limit` query language over in-memory
//! collections.
//!
//! Conditions are keyed by a field name with an optional operator suffix:
//!
//! | Key | Matches when |
//! |-----|--------------|
//! | `title` | value equals the operand |
//! | `price.gt` / `.gte` / `.lt` / `.lte` | value orders after / before the operand |
//! | `status.ne` | value differs from the operand |
//! | `tags.in` / `.nin` | value and operand share (do not share) a member |
//! | `tags.size` | the list value has exactly `operand` items |
//! | `tags.all` | the list value contains every operand item |
//! | `title.matches` | the value matches a regular expression |
//!
//! Implicit rules:
//!
//! - A regex operand turns equality into a pattern match (`.ne`/`.nin` into a
//!   negated match).
//! - Equality against a list-valued field (a has-many or many-to-many
//!   association, a tags field) behaves like `.in`: any member may match.
//! - Links to other entries compare by identifier. Operands that are links
//!   are reduced the same way, so `author: "jane"` and `author: <link to jane>`
//!   are equivalent.
//!
//! All conditions are ANDed. Results are fresh vectors; re-running a query
//! re-filters the live collection.

use crate::locale::Locale;
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("unknown operator '{operator}' in condition on '{field}'")]
    UnknownOperator { field: String, operator: String },
    #[error("operator '{0}' does not accept a pattern operand")]
    PatternNotSupported(String),
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("invalid order_by clause '{0}'")]
    InvalidOrder(String),
}

/// Anything a query can filter: exposes field values by name.
pub trait Queryable {
    /// Value of `field` under `locale`. Unknown fields read as `None`.
    fn field_value(&self, field: &str, locale: &Locale) -> Option<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Size,
    All,
    Matches,
}

impl Operator {
    pub fn parse(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "in" => Operator::In,
            "nin" => Operator::Nin,
            "size" => Operator::Size,
            "all" => Operator::All,
            "matches" => Operator::Matches,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::Size => "size",
            Operator::All => "all",
            Operator::Matches => "matches",
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Pattern(Regex),
}

impl Operand {
    pub fn pattern(source: &str) -> Result<Self, QueryError> {
        Ok(Operand::Pattern(Regex::new(source)?))
    }

    /// Decode a JSON operand. Strings written as `/pattern/` become regexes.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, QueryError> {
        if let Some(s) = json.as_str()
            && s.len() >= 2
            && s.starts_with('/')
            && s.ends_with('/')
        {
            return Operand::pattern(&s[1..s.len() - 1]);
        }
        Ok(Operand::Value(Value::from_json(json)))
    }
}

impl<T: Into<Value>> From<T> for Operand {
    fn from(value: T) -> Self {
        Operand::Value(value.into())
    }
}

/// One `field[.operator] => operand` clause.
#[derive(Debug, Clone)]
pub struct Condition {
    field: String,
    operator: Operator,
    negated: bool,
    operand: Operand,
}

impl Condition {
    pub fn new(key: &str, operand: impl Into<Operand>) -> Result<Self, QueryError> {
        let operand = operand.into();
        let (field, operator) = match key.rsplit_once('.') {
            Some((field, suffix)) => match Operator::parse(suffix) {
                Some(op) => (field, op),
                None => {
                    return Err(QueryError::UnknownOperator {
                        field: field.to_string(),
                        operator: suffix.to_string(),
                    });
                }
            },
            None => (key, Operator::Eq),
        };

        let (operator, negated) = match (&operand, operator) {
            (Operand::Pattern(_), Operator::Eq | Operator::In | Operator::Matches) => {
                (Operator::Matches, false)
            }
            (Operand::Pattern(_), Operator::Ne | Operator::Nin) => (Operator::Matches, true),
            (Operand::Pattern(_), other) => {
                return Err(QueryError::PatternNotSupported(other.name().to_string()));
            }
            (Operand::Value(_), Operator::Matches) => {
                return Err(QueryError::UnknownOperator {
                    field: field.to_string(),
                    operator: "matches (needs a pattern)".to_string(),
                });
            }
            (Operand::Value(_), op) => (op, false),
        };

        Ok(Self {
            field: field.to_string(),
            operator,
            negated,
            operand,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn matches<T: Queryable + ?Sized>(&self, item: &T, locale: &Locale) -> bool {
        let value = item
            .field_value(&self.field, locale)
            .unwrap_or(Value::Null)
            .to_identifiers();

        let result = match &self.operand {
            Operand::Pattern(re) => match &value {
                Value::List(items) => items.iter().any(|v| re.is_match(&v.to_string())),
                Value::Null => false,
                v => re.is_match(&v.to_string()),
            },
            Operand::Value(operand) => {
                let operand = operand.to_identifiers();
                let operator = match (self.operator, &value) {
                    (Operator::Eq, Value::List(_)) => Operator::In,
                    (op, _) => op,
                };
                evaluate(operator, &value, &operand)
            }
        };
        result != self.negated
    }
}

fn evaluate(operator: Operator, value: &Value, operand: &Value) -> bool {
    match operator {
        Operator::Eq => value.loose_eq(operand),
        Operator::Ne => match value {
            Value::List(_) => !intersects(value, operand),
            v => !v.loose_eq(operand),
        },
        Operator::Gt => value.compare(operand) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            value.compare(operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => value.compare(operand) == Some(Ordering::Less),
        Operator::Lte => matches!(
            value.compare(operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => intersects(value, operand),
        Operator::Nin => !intersects(value, operand),
        Operator::Size => match (value.as_list(), operand.as_i64()) {
            (Some(items), Some(n)) => items.len() as i64 == n,
            (None, Some(0)) => value.is_null(),
            _ => false,
        },
        Operator::All => match (value.as_list(), operand) {
            (Some(items), Value::List(wanted)) => wanted
                .iter()
                .all(|w| items.iter().any(|v| v.loose_eq(w))),
            (Some(items), single) => items.iter().any(|v| v.loose_eq(single)),
            _ => false,
        },
        // Value operands never reach here; the constructor rejects them.
        Operator::Matches => false,
    }
}

/// Set-membership test, symmetric in which side is a list.
fn intersects(value: &Value, operand: &Value) -> bool {
    match (value, operand) {
        (Value::List(values), Value::List(operands)) => values
            .iter()
            .any(|v| operands.iter().any(|o| v.loose_eq(o))),
        (Value::List(values), o) => values.iter().any(|v| v.loose_eq(o)),
        (v, Value::List(operands)) => operands.iter().any(|o| v.loose_eq(o)),
        (v, o) => v.loose_eq(o),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    /// Parse `"field"`, `"field asc"` or `"field desc"`.
    pub fn parse(clause: &str) -> Result<Self, QueryError> {
        let mut parts = clause.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| QueryError::InvalidOrder(clause.to_string()))?;
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Direction::Asc,
            Some("desc") => Direction::Desc,
            Some(_) => return Err(QueryError::InvalidOrder(clause.to_string())),
        };
        if parts.next().is_some() {
            return Err(QueryError::InvalidOrder(clause.to_string()));
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// A chain of conditions plus optional ordering and limit.
#[derive(Debug, Clone, Default)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Option<OrderBy>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `where` clause.
    pub fn filter(mut self, key: &str, operand: impl Into<Operand>) -> Result<Self, QueryError> {
        self.conditions.push(Condition::new(key, operand)?);
        Ok(self)
    }

    pub fn order_by(mut self, clause: &str) -> Result<Self, QueryError> {
        self.order = Some(OrderBy::parse(clause)?);
        Ok(self)
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Build a query from a `where` mapping. The reserved keys `order_by`
    /// and `limit` configure ordering and truncation.
    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self, QueryError> {
        let mut query = Query::new();
        for (key, raw) in map {
            match key.as_str() {
                "order_by" => {
                    let clause = raw
                        .as_str()
                        .ok_or_else(|| QueryError::InvalidOrder(raw.to_string()))?;
                    query = query.order_by(clause)?;
                }
                "limit" => {
                    let n = raw
                        .as_u64()
                        .ok_or_else(|| QueryError::InvalidOrder(format!("limit {raw}")))?;
                    query = query.limit(n as usize);
                }
                _ => query = query.filter(key, Operand::from_json(raw)?)?,
            }
        }
        Ok(query)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches<T: Queryable + ?Sized>(&self, item: &T, locale: &Locale) -> bool {
        self.conditions.iter().all(|c| c.matches(item, locale))
    }

    /// Filter, sort and truncate `items`.
    pub fn run<'a, T, I>(&self, items: I, locale: &Locale) -> Vec<&'a T>
    where
        T: Queryable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut results: Vec<&'a T> = items
            .into_iter()
            .filter(|item| self.matches(*item, locale))
            .collect();

        if let Some(order) = &self.order {
            results.sort_by(|a, b| {
                let left = a.field_value(&order.field, locale).unwrap_or_default();
                let right = b.field_value(&order.field, locale).unwrap_or_default();
                let ordering = compare_for_sort(&left, &right);
                match order.direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }
        results
    }

    pub fn first<'a, T, I>(&self, items: I, locale: &Locale) -> Option<&'a T>
    where
        T: Queryable + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.run(items, locale).into_iter().next()
    }
}

/// Nulls first, then the natural ordering; incomparable pairs keep their
/// relative order.
fn compare_for_sort(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Link;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Row(BTreeMap<&'static str, Value>);

    impl Queryable for Row {
        fn field_value(&self, field: &str, _locale: &Locale) -> Option<Value> {
            self.0.get(field).cloned()
        }
    }

    fn row(fields: &[(&'static str, Value)]) -> Row {
        Row(fields.iter().cloned().collect())
    }

    fn en() -> Locale {
        Locale::from("en")
    }

    fn link(id: &str) -> Value {
        Value::Link(Link {
            key: format!("authors/{id}"),
            id: id.to_string(),
        })
    }

    fn rows() -> Vec<Row> {
        vec![
            row(&[
                ("title", "Alpha".into()),
                ("price", 10.into()),
                ("tags", vec!["red", "blue"].into()),
                ("author", link("jane")),
            ]),
            row(&[
                ("title", "Beta".into()),
                ("price", 25.into()),
                ("tags", vec!["green"].into()),
                ("author", link("john")),
            ]),
            row(&[
                ("title", "Gamma".into()),
                ("price", 5.into()),
                ("tags", Value::List(vec![])),
                ("author", Value::Null),
            ]),
        ]
    }

    fn titles(results: &[&Row]) -> Vec<String> {
        results
            .iter()
            .map(|r| r.0["title"].to_string())
            .collect()
    }

    #[test]
    fn equality() {
        let rows = rows();
        let q = Query::new().filter("title", "Beta").unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Beta"]);
    }

    #[test]
    fn comparison_operators() {
        let rows = rows();
        let q = Query::new().filter("price.gt", 5).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha", "Beta"]);
        let q = Query::new().filter("price.lte", 10).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha", "Gamma"]);
    }

    #[test]
    fn conditions_are_anded() {
        let rows = rows();
        let q = Query::new()
            .filter("price.gte", 5)
            .unwrap()
            .filter("title.ne", "Alpha")
            .unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Beta", "Gamma"]);
    }

    #[test]
    fn in_with_scalar_field() {
        let rows = rows();
        let q = Query::new().filter("title.in", vec!["Alpha", "Gamma"]).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha", "Gamma"]);
    }

    #[test]
    fn in_with_list_field_intersects() {
        let rows = rows();
        let q = Query::new().filter("tags.in", vec!["blue", "green"]).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha", "Beta"]);
        let q = Query::new().filter("tags.nin", vec!["blue"]).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Beta", "Gamma"]);
    }

    #[test]
    fn equality_on_list_field_is_promoted_to_in() {
        let rows = rows();
        let q = Query::new().filter("tags", "red").unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha"]);
    }

    #[test]
    fn size_and_all() {
        let rows = rows();
        let q = Query::new().filter("tags.size", 2).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha"]);
        let q = Query::new().filter("tags.all", vec!["red", "blue"]).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha"]);
        let q = Query::new().filter("tags.size", 0).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Gamma"]);
    }

    #[test]
    fn links_compared_by_identifier() {
        let rows = rows();
        let q = Query::new().filter("author", "jane").unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha"]);
        let q = Query::new().filter("author", link("john")).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Beta"]);
    }

    #[test]
    fn regex_operand_selects_pattern_match() {
        let rows = rows();
        let q = Query::new().filter("title", Operand::pattern("^[AB]").unwrap()).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Alpha", "Beta"]);
        let q = Query::new().filter("title.ne", Operand::pattern("a$").unwrap()).unwrap();
        assert!(q.run(&rows, &en()).is_empty());
    }

    #[test]
    fn unknown_operator_rejected() {
        let err = Query::new().filter("price.between", 3).unwrap_err();
        assert!(matches!(err, QueryError::UnknownOperator { ref operator, .. } if operator == "between"));
    }

    #[test]
    fn pattern_with_ordering_operator_rejected() {
        let err = Query::new()
            .filter("price.gt", Operand::pattern("1").unwrap())
            .unwrap_err();
        assert!(matches!(err, QueryError::PatternNotSupported(_)));
    }

    #[test]
    fn order_by_and_limit() {
        let rows = rows();
        let q = Query::new().order_by("price desc").unwrap().limit(2);
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Beta", "Alpha"]);
        let q = Query::new().order_by("price").unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Gamma", "Alpha", "Beta"]);
    }

    #[test]
    fn order_by_is_stable_and_nulls_first() {
        let rows = vec![
            row(&[("title", "A".into()), ("rank", 1.into())]),
            row(&[("title", "B".into())]),
            row(&[("title", "C".into()), ("rank", 1.into())]),
        ];
        let q = Query::new().order_by("rank asc").unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["B", "A", "C"]);
    }

    #[test]
    fn invalid_order_clause() {
        assert!(matches!(
            OrderBy::parse("price sideways"),
            Err(QueryError::InvalidOrder(_))
        ));
    }

    #[test]
    fn from_json_mapping() {
        let rows = rows();
        let map = json!({
            "price.lt": 20,
            "title": "/a$/",
            "order_by": "title desc",
            "limit": 1
        });
        let q = Query::from_json(map.as_object().unwrap()).unwrap();
        assert_eq!(titles(&q.run(&rows, &en())), vec!["Gamma"]);
    }

    #[test]
    fn rerunning_sees_the_live_collection() {
        let mut rows = rows();
        let q = Query::new().filter("price.gt", 20).unwrap();
        assert_eq!(q.run(&rows, &en()).len(), 1);
        rows.push(row(&[("title", "Delta".into()), ("price", 40.into())]));
        assert_eq!(q.run(&rows, &en()).len(), 2);
    }
}
