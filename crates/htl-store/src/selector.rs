//! Document selectors.
//!
//! A selector is a predicate over a stored JSON document, written in the
//! Mango style used by document ledgers:
//!
//! ```text
//! {"selector": {"batchState": "READY_FOR_SALE", "yieldQuantity": {"$gte": 100}}}
//! ```
//!
//! Supported forms:
//! - implicit equality: `{"field": value}`
//! - dotted paths and nested objects: `{"a.b": 1}` is the same as `{"a": {"b": 1}}`
//! - field operators: `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$exists`, `$in`, `$nin`
//! - combinators: `$and` and `$or` over arrays of selectors, `$not` over a selector
//!
//! Numbers compare numerically and strings lexically. Ordering operators never
//! match values of different JSON types. Every operator except
//! `{"$exists": false}` requires the field to be present.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Predicate applied to a single field.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Exists(bool),
    In(Vec<Value>),
    Nin(Vec<Value>),
}

impl Condition {
    fn parse(op: &str, arg: &Value) -> StoreResult<Self> {
        let cond = match op {
            "$eq" => Self::Eq(arg.clone()),
            "$ne" => Self::Ne(arg.clone()),
            "$gt" => Self::Gt(arg.clone()),
            "$gte" => Self::Gte(arg.clone()),
            "$lt" => Self::Lt(arg.clone()),
            "$lte" => Self::Lte(arg.clone()),
            "$exists" => match arg {
                Value::Bool(b) => Self::Exists(*b),
                _ => return Err(invalid("$exists takes a boolean")),
            },
            "$in" => Self::In(expect_array(op, arg)?.clone()),
            "$nin" => Self::Nin(expect_array(op, arg)?.clone()),
            other => return Err(invalid(format!("unsupported field operator {other}"))),
        };
        Ok(cond)
    }

    fn matches(&self, field: Option<&Value>) -> bool {
        if let Self::Exists(expected) = self {
            return field.is_some() == *expected;
        }
        let Some(actual) = field else {
            return false;
        };
        match self {
            Self::Eq(v) => values_equal(actual, v),
            Self::Ne(v) => !values_equal(actual, v),
            Self::Gt(v) => compare(actual, v) == Some(Ordering::Greater),
            Self::Gte(v) => matches!(
                compare(actual, v),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(v) => compare(actual, v) == Some(Ordering::Less),
            Self::Lte(v) => matches!(compare(actual, v), Some(Ordering::Less | Ordering::Equal)),
            Self::In(values) => values.iter().any(|v| values_equal(actual, v)),
            Self::Nin(values) => !values.iter().any(|v| values_equal(actual, v)),
            Self::Exists(_) => unreachable!("handled above"),
        }
    }
}

/// Structured filter over stored documents.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    /// Every child must match. An empty list matches every document.
    And(Vec<Selector>),
    /// At least one child must match.
    Or(Vec<Selector>),
    Not(Box<Selector>),
    Field { path: Vec<String>, condition: Condition },
}

impl Selector {
    /// The empty selector, matching every record.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Self::And(children) if children.is_empty())
    }

    /// Condition on a dotted field path.
    pub fn field(path: &str, condition: Condition) -> Self {
        Self::Field {
            path: path.split('.').map(str::to_string).collect(),
            condition,
        }
    }

    pub fn eq(path: &str, value: impl Into<Value>) -> Self {
        Self::field(path, Condition::Eq(value.into()))
    }

    /// Parse a query string: either a bare selector object or a query
    /// document with a `selector` member.
    pub fn parse(query: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(query)
            .map_err(|e| invalid(format!("query is not JSON: {e}")))?;
        Self::from_query(&value)
    }

    /// Like [`Selector::parse`], from an already-decoded document.
    pub fn from_query(value: &Value) -> StoreResult<Self> {
        match value {
            Value::Object(obj) => match obj.get("selector") {
                Some(selector) => Self::from_value(selector),
                None => Self::from_value(value),
            },
            _ => Err(invalid("query must be a JSON object")),
        }
    }

    /// Parse a selector object.
    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("selector must be a JSON object"))?;
        let mut clauses = parse_object(obj, &[])?;
        if clauses.len() == 1 {
            Ok(clauses.remove(0))
        } else {
            Ok(Self::And(clauses))
        }
    }

    /// Evaluate against a decoded document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(doc)),
            Self::Or(children) => children.iter().any(|c| c.matches(doc)),
            Self::Not(inner) => !inner.matches(doc),
            Self::Field { path, condition } => condition.matches(lookup(doc, path)),
        }
    }

    /// Evaluate against stored bytes. Bytes that are not JSON only match the
    /// empty selector.
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        if self.is_match_all() {
            return true;
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(doc) => self.matches(&doc),
            Err(_) => false,
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::all()
    }
}

fn parse_object(obj: &Map<String, Value>, prefix: &[String]) -> StoreResult<Vec<Selector>> {
    let mut clauses = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match key.as_str() {
            "$and" => clauses.push(Selector::And(parse_list(key, value)?)),
            "$or" => clauses.push(Selector::Or(parse_list(key, value)?)),
            "$not" => clauses.push(Selector::Not(Box::new(Selector::from_value(value)?))),
            op if op.starts_with('$') => {
                return Err(invalid(format!("unsupported combinator {op}")));
            }
            _ => {
                let mut path = prefix.to_vec();
                for segment in key.split('.') {
                    if segment.is_empty() {
                        return Err(invalid(format!("empty path segment in {key:?}")));
                    }
                    path.push(segment.to_string());
                }
                clauses.extend(parse_field(path, value)?);
            }
        }
    }
    Ok(clauses)
}

fn parse_field(path: Vec<String>, value: &Value) -> StoreResult<Vec<Selector>> {
    let Value::Object(obj) = value else {
        return Ok(vec![Selector::Field {
            path,
            condition: Condition::Eq(value.clone()),
        }]);
    };
    if obj.is_empty() {
        return Ok(vec![Selector::Field {
            path,
            condition: Condition::Eq(value.clone()),
        }]);
    }

    let operators = obj.keys().filter(|k| k.starts_with('$')).count();
    if operators == 0 {
        return parse_object(obj, &path);
    }
    if operators != obj.len() {
        return Err(invalid(format!(
            "field {} mixes operators and sub-fields",
            path.join(".")
        )));
    }
    obj.iter()
        .map(|(op, arg)| {
            Ok(Selector::Field {
                path: path.clone(),
                condition: Condition::parse(op, arg)?,
            })
        })
        .collect()
}

fn parse_list(op: &str, value: &Value) -> StoreResult<Vec<Selector>> {
    let items = expect_array(op, value)?;
    if items.is_empty() {
        return Err(invalid(format!("{op} requires a non-empty array")));
    }
    items.iter().map(Selector::from_value).collect()
}

fn expect_array<'a>(op: &str, value: &'a Value) -> StoreResult<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| invalid(format!("{op} takes an array")))
}

fn lookup<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, segment| current.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn invalid(reason: impl Into<String>) -> StoreError {
    StoreError::InvalidSelector(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch() -> Value {
        json!({
            "batchId": "b1",
            "batchState": "READY_FOR_SALE",
            "yieldQuantity": 500,
            "grower": "M1",
            "lab": {"name": "Acme Labs", "accredited": true},
        })
    }

    fn sel(query: Value) -> Selector {
        Selector::from_query(&query).unwrap()
    }

    #[test]
    fn empty_selector_matches_everything() {
        let s = Selector::parse(r#"{"selector": {}}"#).unwrap();
        assert!(s.is_match_all());
        assert!(s.matches(&batch()));
        assert!(s.matches_bytes(b"not json at all"));
    }

    #[test]
    fn implicit_equality() {
        assert!(sel(json!({"grower": "M1"})).matches(&batch()));
        assert!(!sel(json!({"grower": "M2"})).matches(&batch()));
        assert!(!sel(json!({"trader": "M1"})).matches(&batch()));
    }

    #[test]
    fn multiple_fields_are_anded() {
        let s = sel(json!({"selector": {"grower": "M1", "batchState": "PLANTED"}}));
        assert!(!s.matches(&batch()));
        let s = sel(json!({"selector": {"grower": "M1", "batchState": "READY_FOR_SALE"}}));
        assert!(s.matches(&batch()));
    }

    #[test]
    fn dotted_and_nested_paths_agree() {
        let dotted = sel(json!({"lab.name": "Acme Labs"}));
        let nested = sel(json!({"lab": {"name": "Acme Labs"}}));
        assert!(dotted.matches(&batch()));
        assert!(nested.matches(&batch()));
        assert_eq!(dotted, nested);
    }

    #[test]
    fn numeric_ranges() {
        assert!(sel(json!({"yieldQuantity": {"$gte": 500}})).matches(&batch()));
        assert!(sel(json!({"yieldQuantity": {"$gt": 100, "$lt": 1000}})).matches(&batch()));
        assert!(!sel(json!({"yieldQuantity": {"$lt": 500}})).matches(&batch()));
        assert!(sel(json!({"yieldQuantity": {"$lte": 500.0}})).matches(&batch()));
        assert!(sel(json!({"yieldQuantity": 500.0})).matches(&batch()));
    }

    #[test]
    fn ordering_never_crosses_types() {
        assert!(!sel(json!({"yieldQuantity": {"$gt": "100"}})).matches(&batch()));
        assert!(!sel(json!({"grower": {"$lt": 5}})).matches(&batch()));
    }

    #[test]
    fn string_ranges_are_lexical() {
        assert!(sel(json!({"grower": {"$gt": "M0"}})).matches(&batch()));
        assert!(!sel(json!({"grower": {"$gt": "M1"}})).matches(&batch()));
    }

    #[test]
    fn exists_and_missing_fields() {
        assert!(sel(json!({"trader": {"$exists": false}})).matches(&batch()));
        assert!(sel(json!({"grower": {"$exists": true}})).matches(&batch()));
        assert!(!sel(json!({"trader": {"$ne": "x"}})).matches(&batch()));
        assert!(sel(json!({"grower": {"$ne": "x"}})).matches(&batch()));
    }

    #[test]
    fn membership() {
        assert!(sel(json!({"grower": {"$in": ["M1", "M2"]}})).matches(&batch()));
        assert!(!sel(json!({"grower": {"$nin": ["M1", "M2"]}})).matches(&batch()));
        assert!(sel(json!({"grower": {"$nin": ["M3"]}})).matches(&batch()));
    }

    #[test]
    fn combinators() {
        let s = sel(json!({"$or": [{"grower": "M9"}, {"batchId": "b1"}]}));
        assert!(s.matches(&batch()));
        let s = sel(json!({"$and": [{"grower": "M1"}, {"batchId": "b2"}]}));
        assert!(!s.matches(&batch()));
        let s = sel(json!({"$not": {"grower": "M9"}}));
        assert!(s.matches(&batch()));
    }

    #[test]
    fn malformed_selectors_are_rejected() {
        for bad in [
            json!([1, 2]),
            json!({"selector": "grower"}),
            json!({"$or": []}),
            json!({"$or": {"grower": "M1"}}),
            json!({"$nor": [{"a": 1}]}),
            json!({"grower": {"$regex": "M.*"}}),
            json!({"grower": {"$gt": 1, "name": "x"}}),
            json!({"a..b": 1}),
            json!({"a": {"$exists": "yes"}}),
        ] {
            let err = Selector::from_query(&bad).unwrap_err();
            assert!(matches!(err, StoreError::InvalidSelector(_)), "{bad}");
        }
        assert!(Selector::parse("{not json").is_err());
    }

    #[test]
    fn non_json_bytes_only_match_the_empty_selector() {
        assert!(!Selector::eq("grower", "M1").matches_bytes(b"\xff\xfe"));
        assert!(Selector::all().matches_bytes(b"\xff\xfe"));
    }

    proptest::proptest! {
        #[test]
        fn numeric_operators_agree_with_integer_order(x in -10_000i64..10_000, y in -10_000i64..10_000) {
            let doc = json!({"n": x});
            proptest::prop_assert_eq!(Selector::field("n", Condition::Gt(json!(y))).matches(&doc), x > y);
            proptest::prop_assert_eq!(Selector::field("n", Condition::Lte(json!(y))).matches(&doc), x <= y);
            proptest::prop_assert_eq!(Selector::eq("n", y).matches(&doc), x == y);
        }
    }
}
