use anyhow::{anyhow, bail, Result};
use serde_json::Value;

/// Condition expressions attached to connections and trigger filters.
///
/// Wire format is plain JSON:
///
/// ```json
/// { "field": "trigger/lead/status", "op": "eq", "value": "qualified" }
/// { "all": [ <condition>, <condition> ] }
/// { "any": [ <condition> ] }
/// { "not": <condition> }
/// ```
///
/// Field paths are slash-separated lookups into the evaluation context.
/// A missing field never errors: `exists` sees it as absent, every other
/// operator evaluates to false.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Exists,
    In,
}

impl CompareOp {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "eq" => CompareOp::Eq,
            "neq" => CompareOp::Neq,
            "gt" => CompareOp::Gt,
            "gte" => CompareOp::Gte,
            "lt" => CompareOp::Lt,
            "lte" => CompareOp::Lte,
            "contains" => CompareOp::Contains,
            "exists" => CompareOp::Exists,
            "in" => CompareOp::In,
            other => bail!("unknown condition operator: {}", other),
        })
    }
}

impl Condition {
    pub fn parse(raw: &Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| anyhow!("condition must be a JSON object"))?;

        if let Some(branches) = obj.get("all") {
            let list = branches
                .as_array()
                .ok_or_else(|| anyhow!("'all' must be an array of conditions"))?;
            return Ok(Condition::All(
                list.iter().map(Condition::parse).collect::<Result<_>>()?,
            ));
        }

        if let Some(branches) = obj.get("any") {
            let list = branches
                .as_array()
                .ok_or_else(|| anyhow!("'any' must be an array of conditions"))?;
            return Ok(Condition::Any(
                list.iter().map(Condition::parse).collect::<Result<_>>()?,
            ));
        }

        if let Some(inner) = obj.get("not") {
            return Ok(Condition::Not(Box::new(Condition::parse(inner)?)));
        }

        let field = obj
            .get("field")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("comparison requires a string 'field'"))?;
        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("comparison requires a string 'op'"))?;

        Ok(Condition::Compare {
            field: field.to_string(),
            op: CompareOp::parse(op)?,
            value: obj.get("value").cloned().unwrap_or(Value::Null),
        })
    }

    pub fn evaluate(&self, context: &Value) -> bool {
        match self {
            Condition::All(list) => list.iter().all(|c| c.evaluate(context)),
            Condition::Any(list) => list.iter().any(|c| c.evaluate(context)),
            Condition::Not(inner) => !inner.evaluate(context),
            Condition::Compare { field, op, value } => {
                let actual = lookup(context, field);
                compare(*op, actual, value)
            }
        }
    }
}

/// Slash-path lookup, absent and explicit-null both count as missing
fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    context
        .pointer(&format!("/{}", path))
        .filter(|v| !v.is_null())
}

fn compare(op: CompareOp, actual: Option<&Value>, expected: &Value) -> bool {
    if op == CompareOp::Exists {
        let present = actual.is_some();
        return match expected {
            Value::Bool(false) => !present,
            _ => present,
        };
    }

    let Some(actual) = actual else {
        return false;
    };

    match op {
        CompareOp::Eq => loose_eq(actual, expected),
        CompareOp::Neq => !loose_eq(actual, expected),
        CompareOp::Gt => ordering(actual, expected).is_some_and(|o| o.is_gt()),
        CompareOp::Gte => ordering(actual, expected).is_some_and(|o| o.is_ge()),
        CompareOp::Lt => ordering(actual, expected).is_some_and(|o| o.is_lt()),
        CompareOp::Lte => ordering(actual, expected).is_some_and(|o| o.is_le()),
        CompareOp::Contains => match actual {
            Value::String(s) => expected.as_str().map(|e| s.contains(e)).unwrap_or(false),
            Value::Array(items) => items.iter().any(|item| loose_eq(item, expected)),
            _ => false,
        },
        CompareOp::In => expected
            .as_array()
            .map(|options| options.iter().any(|o| loose_eq(actual, o)))
            .unwrap_or(false),
        CompareOp::Exists => unreachable!("handled above"),
    }
}

/// JSON equality with numbers compared as f64 so 1 == 1.0
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (a.as_f64(), b.as_f64()) {
        return x.partial_cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return Some(x.cmp(y));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Value {
        json!({
            "trigger": {
                "lead": {
                    "name": "Dana Woods",
                    "status": "qualified",
                    "score": 72,
                    "tags": ["inbound", "priority"],
                    "company": null
                }
            },
            "steps": {}
        })
    }

    fn eval(raw: Value) -> bool {
        Condition::parse(&raw).unwrap().evaluate(&context())
    }

    #[test]
    fn test_eq_on_nested_field() {
        assert!(eval(
            json!({"field": "trigger/lead/status", "op": "eq", "value": "qualified"})
        ));
        assert!(!eval(
            json!({"field": "trigger/lead/status", "op": "eq", "value": "new"})
        ));
    }

    #[test]
    fn test_numbers_compare_loosely() {
        assert!(eval(
            json!({"field": "trigger/lead/score", "op": "eq", "value": 72.0})
        ));
        assert!(eval(
            json!({"field": "trigger/lead/score", "op": "gt", "value": 50})
        ));
        assert!(!eval(
            json!({"field": "trigger/lead/score", "op": "lt", "value": 72})
        ));
        assert!(eval(
            json!({"field": "trigger/lead/score", "op": "lte", "value": 72})
        ));
    }

    #[test]
    fn test_contains_on_strings_and_arrays() {
        assert!(eval(
            json!({"field": "trigger/lead/name", "op": "contains", "value": "Woods"})
        ));
        assert!(eval(
            json!({"field": "trigger/lead/tags", "op": "contains", "value": "priority"})
        ));
        assert!(!eval(
            json!({"field": "trigger/lead/tags", "op": "contains", "value": "outbound"})
        ));
    }

    #[test]
    fn test_in_operator() {
        assert!(eval(json!({
            "field": "trigger/lead/status",
            "op": "in",
            "value": ["qualified", "converted"]
        })));
        assert!(!eval(json!({
            "field": "trigger/lead/status",
            "op": "in",
            "value": ["new", "lost"]
        })));
    }

    #[test]
    fn test_exists_treats_null_as_absent() {
        assert!(eval(
            json!({"field": "trigger/lead/score", "op": "exists"})
        ));
        assert!(!eval(
            json!({"field": "trigger/lead/company", "op": "exists"})
        ));
        assert!(eval(
            json!({"field": "trigger/lead/company", "op": "exists", "value": false})
        ));
    }

    #[test]
    fn test_missing_field_is_false_not_an_error() {
        assert!(!eval(
            json!({"field": "trigger/lead/nope", "op": "eq", "value": "anything"})
        ));
        assert!(!eval(
            json!({"field": "trigger/lead/nope", "op": "gt", "value": 1})
        ));
    }

    #[test]
    fn test_boolean_combinators() {
        assert!(eval(json!({"all": [
            {"field": "trigger/lead/status", "op": "eq", "value": "qualified"},
            {"field": "trigger/lead/score", "op": "gte", "value": 70}
        ]})));
        assert!(eval(json!({"any": [
            {"field": "trigger/lead/status", "op": "eq", "value": "lost"},
            {"field": "trigger/lead/score", "op": "gte", "value": 70}
        ]})));
        assert!(eval(json!({"not":
            {"field": "trigger/lead/status", "op": "eq", "value": "lost"}
        })));
    }

    #[test]
    fn test_parse_rejects_malformed_expressions() {
        assert!(Condition::parse(&json!("not an object")).is_err());
        assert!(Condition::parse(&json!({"field": "x"})).is_err());
        assert!(Condition::parse(&json!({"field": "x", "op": "between", "value": 1})).is_err());
        assert!(Condition::parse(&json!({"all": "nope"})).is_err());
    }
}
