//! JSON-Logic import.
//!
//! Policies may carry their ABAC clause as a JSON-Logic expression
//! (`abacLogic`). It is compiled once, at load time, into the canonical
//! [`Condition`] tree, so there is a single evaluator.
//!
//! Supported: `true`, `false`, `and`, `or`, `!`, `==`, `===`, `!=`, `!==`,
//! `in` (array membership) and `var` operands. Equality is always strict.
//! Any unsupported operator or shape turns the whole expression into a
//! `Malformed` condition.

use serde_json::Value as Json;

use crate::condition::{Condition, Operand, ABSOLUTE_MAX_CONDITION_DEPTH};
use crate::path::Path;
use crate::value::Value;

impl Condition {
    /// Compile a JSON-Logic expression. Never fails.
    pub fn from_json_logic(json: &Json) -> Condition {
        match compile(json, 1) {
            Ok(cond) => cond,
            Err(reason) => {
                tracing::warn!(%reason, "rejected JSON-Logic expression");
                Condition::malformed(json.clone(), reason)
            }
        }
    }
}

fn compile(json: &Json, depth: usize) -> Result<Condition, String> {
    if depth > ABSOLUTE_MAX_CONDITION_DEPTH {
        return Err(format!(
            "nesting deeper than {ABSOLUTE_MAX_CONDITION_DEPTH} levels"
        ));
    }

    let map = match json {
        Json::Bool(true) => return Ok(Condition::all(Vec::new())),
        Json::Bool(false) => return Ok(Condition::any(Vec::new())),
        Json::Object(map) => map,
        other => return Err(format!("expected an operation, found `{other}`")),
    };

    let mut entries = map.iter();
    let (Some((op, args)), None) = (entries.next(), entries.next()) else {
        return Err("operation must have exactly one operator".to_owned());
    };

    match op.as_str() {
        "and" | "or" => {
            let items = args
                .as_array()
                .ok_or_else(|| format!("`{op}` expects an array"))?;
            let children = items
                .iter()
                .map(|item| compile(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if op == "and" {
                Condition::all(children)
            } else {
                Condition::any(children)
            })
        }
        "!" => {
            let inner = match args {
                Json::Array(items) if items.len() == 1 => &items[0],
                Json::Array(_) => return Err("`!` expects one argument".to_owned()),
                other => other,
            };
            Ok(Condition::negate(compile(inner, depth + 1)?))
        }
        "==" | "===" | "!=" | "!==" | "in" => {
            let (a, b) = match args.as_array().map(Vec::as_slice) {
                Some([a, b]) => (operand(a)?, operand(b)?),
                _ => return Err(format!("`{op}` expects exactly two arguments")),
            };
            Ok(match op.as_str() {
                "==" | "===" => Condition::equals(a, b),
                "!=" | "!==" => Condition::not_equals(a, b),
                _ => Condition::is_in(a, b),
            })
        }
        other => Err(format!("unsupported operator `{other}`")),
    }
}

fn operand(json: &Json) -> Result<Operand, String> {
    match json {
        Json::Object(map) => {
            let var = match (map.len(), map.get("var")) {
                (1, Some(var)) => var,
                _ => return Err(format!("unsupported operand `{json}`")),
            };
            let dotted = match var {
                Json::String(s) => s,
                Json::Array(items) => match items.as_slice() {
                    [Json::String(s)] => s,
                    _ => return Err("`var` defaults are not supported".to_owned()),
                },
                other => return Err(format!("`var` expects a path, found `{other}`")),
            };
            Path::parse(dotted)
                .map(Operand::Path)
                .map_err(|e| e.to_string())
        }
        // Strings are literals here; `${...}` has no meaning in JSON-Logic.
        Json::String(s) => Ok(Operand::Literal(Value::String(s.clone()))),
        other => Ok(Operand::Literal(Value::from(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        Value::from(&json!({
            "subject": { "sub": "u1", "uaIds": ["FCEyN"] },
            "resource": { "ownerId": "u1", "status": "OPEN", "uaId": "FCEyN" }
        }))
    }

    #[test]
    fn test_compile_comparisons() {
        let c = Condition::from_json_logic(&json!({
            "==": [{ "var": "resource.ownerId" }, { "var": "subject.sub" }]
        }));
        assert_eq!(
            c,
            Condition::equals(
                Operand::path("resource.ownerId").unwrap(),
                Operand::path("subject.sub").unwrap()
            )
        );
        assert!(c.evaluate(&ctx()));

        let c = Condition::from_json_logic(&json!({ "!==": [{ "var": ["resource.status"] }, "CLOSED"] }));
        assert!(c.evaluate(&ctx()));
    }

    #[test]
    fn test_compile_matches_native_form() {
        let logic = Condition::from_json_logic(&json!({ "and": [
            { "===": [{ "var": "resource.status" }, "OPEN"] },
            { "in": [{ "var": "resource.uaId" }, { "var": "subject.uaIds" }] }
        ]}));
        let native = Condition::from_json(&json!({ "all": [
            { "eq": ["${resource.status}", "OPEN"] },
            { "in": ["${resource.uaId}", "${subject.uaIds}"] }
        ]}));
        assert_eq!(logic, native);
        assert!(logic.evaluate(&ctx()));
    }

    #[test]
    fn test_compile_booleans_and_negation() {
        assert!(Condition::from_json_logic(&json!(true)).evaluate(&ctx()));
        assert!(!Condition::from_json_logic(&json!(false)).evaluate(&ctx()));
        assert!(Condition::from_json_logic(&json!({ "!": [false] })).evaluate(&ctx()));
        assert!(Condition::from_json_logic(&json!({ "or": [false, { "!": true }, true] })).evaluate(&ctx()));
    }

    #[test]
    fn test_equality_is_strict() {
        let c = Condition::from_json_logic(&json!({ "==": [1, "1"] }));
        assert!(!c.is_malformed());
        assert!(!c.evaluate(&ctx()));
    }

    #[test]
    fn test_structural_errors_reject_whole_expression() {
        let shapes = [
            json!("resource.status"),
            json!({ ">": [2, 1] }),
            json!({ "or": [true, { "bogus": [] }] }),
            json!({ "and": true }),
            json!({ "==": [1] }),
            json!({ "==": [{ "var": ["a", "default"] }, 1] }),
            json!({ "==": [{ "var": "a..b" }, 1] }),
            json!({ "==": [{ "cat": ["a", "b"] }, "ab"] }),
            json!({ "!": [true, false] }),
            json!({ "and": [], "or": [] }),
        ];
        for shape in shapes {
            let c = Condition::from_json_logic(&shape);
            assert!(c.is_malformed(), "expected malformed: {shape}");
            assert!(!c.evaluate(&ctx()));
        }
    }

    #[test]
    fn test_marker_strings_are_literals() {
        let c = Condition::from_json_logic(&json!({ "==": ["${subject.sub}", "u1"] }));
        assert!(!c.evaluate(&ctx()));
    }
}
