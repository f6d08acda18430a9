//! Boolean condition evaluation.
//!
//! Compact expression language: `eq`, `ne`, `includes`, `in`, combined with
//! `all`, `any` and `not`. Operands are literals or `${path}` references
//! resolved against the request tree.
//!
//! Parsing never fails: shapes that cannot be understood become `Malformed`
//! nodes, which evaluate to `false`. Evaluation and drop are stack-based
//! (non-recursive) so a hostile tree cannot exhaust the native stack.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::json;

use crate::error::ConditionError;
use crate::path::Path;
use crate::stats::EvaluationStats;
use crate::value::Value;

/// Default nesting limit applied at evaluation and validation time.
pub const DEFAULT_MAX_CONDITION_DEPTH: usize = 32;

/// Hard nesting limit applied while parsing. Deeper input becomes `Malformed`.
pub const ABSOLUTE_MAX_CONDITION_DEPTH: usize = 128;

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Used as-is.
    Literal(Value),
    /// Looked up in the request tree at evaluation time.
    Path(Path),
}

impl Operand {
    /// A path operand from a bare dotted path such as `resource.ownerId`.
    pub fn path(dotted: &str) -> Result<Self, ConditionError> {
        Path::parse(dotted).map(Operand::Path)
    }

    /// A literal operand.
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    /// Read an operand from its JSON form. Strings wrapped in `${...}` are
    /// paths, everything else is a literal.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, ConditionError> {
        match json {
            serde_json::Value::String(s) => match Path::from_marker(s) {
                Some(path) => path.map(Operand::Path),
                None => Ok(Operand::Literal(Value::String(s.clone()))),
            },
            other => Ok(Operand::Literal(Value::from(other))),
        }
    }

    /// Render back to the JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Operand::Literal(value) => serde_json::Value::from(value),
            Operand::Path(path) => serde_json::Value::String(path.to_marker()),
        }
    }

    /// Resolve against the request tree. A missing path yields `None`.
    #[inline]
    pub fn resolve<'a>(&'a self, root: &'a Value) -> Option<&'a Value> {
        match self {
            Operand::Literal(value) => Some(value),
            Operand::Path(path) => root.lookup(path),
        }
    }
}

/// A condition tree evaluated against a decision request.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Both sides present and equal.
    Eq(Operand, Operand),
    /// Sides differ. Two absent sides satisfy neither `Eq` nor `Ne`.
    Ne(Operand, Operand),
    /// First side is an array containing the second.
    Includes(Operand, Operand),
    /// Second side is an array containing the first.
    In(Operand, Operand),
    /// Every child holds. Empty is true.
    All(Vec<Condition>),
    /// At least one child holds. Empty is false.
    Any(Vec<Condition>),
    /// The child does not hold.
    Not(Box<Condition>),
    /// Input that could not be understood. Always false.
    Malformed {
        /// The JSON that was rejected, kept for round-tripping and diagnostics.
        raw: serde_json::Value,
        /// Why it was rejected.
        reason: String,
    },
}

impl Condition {
    /// `eq` of two operands.
    pub fn equals(a: Operand, b: Operand) -> Self {
        Condition::Eq(a, b)
    }

    /// `ne` of two operands.
    pub fn not_equals(a: Operand, b: Operand) -> Self {
        Condition::Ne(a, b)
    }

    /// `includes(array, value)`.
    pub fn includes(array: Operand, value: Operand) -> Self {
        Condition::Includes(array, value)
    }

    /// `in(value, array)`.
    pub fn is_in(value: Operand, array: Operand) -> Self {
        Condition::In(value, array)
    }

    /// Conjunction.
    pub fn all(children: Vec<Condition>) -> Self {
        Condition::All(children)
    }

    /// Disjunction.
    pub fn any(children: Vec<Condition>) -> Self {
        Condition::Any(children)
    }

    /// Negation.
    ///
    /// Negating a subtree that contains a `Malformed` node would turn a
    /// rejected shape into `true`, so such a subtree yields `Malformed`.
    pub fn negate(inner: Condition) -> Self {
        if inner.contains_malformed() {
            let raw = json!({ "not": inner.to_json() });
            return Condition::malformed(raw, "`not` over a malformed condition");
        }
        Condition::Not(Box::new(inner))
    }

    /// A rejected node.
    pub fn malformed(raw: serde_json::Value, reason: impl Into<String>) -> Self {
        Condition::Malformed {
            raw,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this node is `Malformed`.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Condition::Malformed { .. })
    }

    /// Parse the canonical JSON form. Never fails.
    pub fn from_json(json: &serde_json::Value) -> Self {
        parse_node(json, 1)
    }

    /// Render the canonical JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Condition::Eq(a, b) => json!({ "eq": [a.to_json(), b.to_json()] }),
            Condition::Ne(a, b) => json!({ "ne": [a.to_json(), b.to_json()] }),
            Condition::Includes(a, b) => json!({ "includes": [a.to_json(), b.to_json()] }),
            Condition::In(a, b) => json!({ "in": [a.to_json(), b.to_json()] }),
            Condition::All(children) => {
                json!({ "all": children.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Any(children) => {
                json!({ "any": children.iter().map(Condition::to_json).collect::<Vec<_>>() })
            }
            Condition::Not(inner) => json!({ "not": inner.to_json() }),
            Condition::Malformed { raw, .. } => raw.clone(),
        }
    }

    /// Compute the depth of this condition tree. A leaf has depth 1.
    ///
    /// Non-recursive to stay safe on unvalidated or extremely deep trees.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = Vec::with_capacity(32);
        stack.push((self, 1usize));

        while let Some((cond, level)) = stack.pop() {
            deepest = deepest.max(level);
            match cond {
                Condition::All(children) | Condition::Any(children) => {
                    stack.extend(children.iter().map(|c| (c, level + 1)));
                }
                Condition::Not(inner) => stack.push((inner.as_ref(), level + 1)),
                _ => {}
            }
        }

        deepest
    }

    /// True if any node in the tree is `Malformed`.
    pub fn contains_malformed(&self) -> bool {
        let mut stack = vec![self];
        while let Some(cond) = stack.pop() {
            match cond {
                Condition::Malformed { .. } => return true,
                Condition::All(children) | Condition::Any(children) => stack.extend(children),
                Condition::Not(inner) => stack.push(inner),
                _ => {}
            }
        }
        false
    }

    /// Validate that this condition is well formed, does not exceed the
    /// maximum depth, and that all strings are within length limits.
    ///
    /// This implementation is non-recursive.
    pub fn validate(&self, max_depth: usize, max_string_len: usize) -> Result<(), ConditionError> {
        let actual = self.depth();
        if actual > max_depth {
            return Err(ConditionError::TooDeep {
                max: max_depth,
                actual,
            });
        }

        let mut stack = vec![self];
        while let Some(cond) = stack.pop() {
            match cond {
                Condition::Eq(a, b)
                | Condition::Ne(a, b)
                | Condition::Includes(a, b)
                | Condition::In(a, b) => {
                    validate_operand(a, max_string_len)?;
                    validate_operand(b, max_string_len)?;
                }
                Condition::All(children) | Condition::Any(children) => stack.extend(children),
                Condition::Not(inner) => stack.push(inner),
                Condition::Malformed { reason, .. } => {
                    return Err(ConditionError::Malformed(reason.clone()));
                }
            }
        }
        Ok(())
    }

    /// Evaluate against a request tree with the default depth limit.
    pub fn evaluate(&self, context: &Value) -> bool {
        let mut stats = EvaluationStats::new();
        self.evaluate_with(context, DEFAULT_MAX_CONDITION_DEPTH, &mut stats)
    }

    /// Evaluate, failing closed: any evaluation error yields `false`.
    pub fn evaluate_with(
        &self,
        context: &Value,
        max_depth: usize,
        stats: &mut EvaluationStats,
    ) -> bool {
        match self.try_evaluate(context, max_depth, stats) {
            Ok(result) => result,
            Err(error) => {
                tracing::debug!(%error, "condition evaluation failed closed");
                false
            }
        }
    }

    /// Evaluate this condition against the given request tree.
    ///
    /// Uses stack-based evaluation to guarantee termination. Returns `Err`
    /// only when the tree is deeper than `max_depth`; in that case no part
    /// of the tree is trusted.
    ///
    /// A `Not` over a subtree containing a `Malformed` node is false, however
    /// the tree was built.
    pub fn try_evaluate(
        &self,
        context: &Value,
        max_depth: usize,
        stats: &mut EvaluationStats,
    ) -> Result<bool, ConditionError> {
        enum Step<'c> {
            Eval(&'c Condition, usize),
            ApplyAll(usize),
            ApplyAny(usize),
            ApplyNot,
        }

        let mut stack: Vec<Step<'_>> = Vec::with_capacity(32);
        stack.push(Step::Eval(self, 1));
        // Each result carries whether its subtree holds a `Malformed` node.
        let mut results: Vec<(bool, bool)> = Vec::with_capacity(16);

        while let Some(step) = stack.pop() {
            match step {
                Step::Eval(cond, depth) => {
                    if depth > max_depth {
                        return Err(ConditionError::TooDeep {
                            max: max_depth,
                            actual: depth,
                        });
                    }
                    stats.update_depth(depth);
                    stats.inc_condition_evals();

                    match cond {
                        Condition::Eq(a, b) => {
                            results.push((strict_eq(a.resolve(context), b.resolve(context)), false));
                        }
                        Condition::Ne(a, b) => {
                            results.push((strict_ne(a.resolve(context), b.resolve(context)), false));
                        }
                        Condition::Includes(array, value) => {
                            results.push((member(value.resolve(context), array.resolve(context)), false));
                        }
                        Condition::In(value, array) => {
                            results.push((member(value.resolve(context), array.resolve(context)), false));
                        }
                        Condition::All(children) => {
                            stack.push(Step::ApplyAll(children.len()));
                            stack.extend(children.iter().rev().map(|c| Step::Eval(c, depth + 1)));
                        }
                        Condition::Any(children) => {
                            stack.push(Step::ApplyAny(children.len()));
                            stack.extend(children.iter().rev().map(|c| Step::Eval(c, depth + 1)));
                        }
                        Condition::Not(inner) => {
                            stack.push(Step::ApplyNot);
                            stack.push(Step::Eval(inner, depth + 1));
                        }
                        Condition::Malformed { reason, .. } => {
                            tracing::trace!(%reason, "malformed condition evaluates to false");
                            results.push((false, true));
                        }
                    }
                }
                Step::ApplyAll(count) => {
                    let start = results.len().checked_sub(count).ok_or(ConditionError::Internal)?;
                    let all = results[start..].iter().all(|(r, _)| *r);
                    let tainted = results[start..].iter().any(|(_, t)| *t);
                    results.truncate(start);
                    results.push((all, tainted));
                }
                Step::ApplyAny(count) => {
                    let start = results.len().checked_sub(count).ok_or(ConditionError::Internal)?;
                    let any = results[start..].iter().any(|(r, _)| *r);
                    let tainted = results[start..].iter().any(|(_, t)| *t);
                    results.truncate(start);
                    results.push((any, tainted));
                }
                Step::ApplyNot => {
                    let (val, tainted) = results.pop().ok_or(ConditionError::Internal)?;
                    results.push((!val && !tainted, tainted));
                }
            }
        }

        // Final result should be the only item on the stack
        let (result, _) = results.pop().ok_or(ConditionError::Internal)?;
        if results.is_empty() {
            Ok(result)
        } else {
            Err(ConditionError::Internal)
        }
    }
}

/// Manual Drop implementation to prevent stack overflows on deep trees.
impl Drop for Condition {
    fn drop(&mut self) {
        let mut stack = Vec::new();
        detach_children(self, &mut stack);

        while let Some(mut cond) = stack.pop() {
            detach_children(&mut cond, &mut stack);
        }
    }
}

fn detach_children(cond: &mut Condition, out: &mut Vec<Condition>) {
    match cond {
        Condition::All(children) | Condition::Any(children) => out.append(children),
        Condition::Not(inner) => {
            out.push(std::mem::replace(inner.as_mut(), Condition::All(Vec::new())));
        }
        _ => {}
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Condition::from_json(&raw))
    }
}

fn parse_node(json: &serde_json::Value, depth: usize) -> Condition {
    if depth > ABSOLUTE_MAX_CONDITION_DEPTH {
        return Condition::malformed(
            json.clone(),
            format!("nesting deeper than {ABSOLUTE_MAX_CONDITION_DEPTH} levels"),
        );
    }

    let Some(map) = json.as_object() else {
        return Condition::malformed(json.clone(), "condition must be an object");
    };
    let mut entries = map.iter();
    let (Some((form, body)), None) = (entries.next(), entries.next()) else {
        return Condition::malformed(json.clone(), "condition must have exactly one key");
    };

    match form.as_str() {
        "eq" | "ne" | "includes" | "in" => match parse_pair(form, body) {
            Ok((a, b)) => match form.as_str() {
                "eq" => Condition::Eq(a, b),
                "ne" => Condition::Ne(a, b),
                "includes" => Condition::Includes(a, b),
                _ => Condition::In(a, b),
            },
            Err(error) => Condition::malformed(json.clone(), error.to_string()),
        },
        "all" | "any" => match body.as_array() {
            Some(items) => {
                let children = items.iter().map(|c| parse_node(c, depth + 1)).collect();
                if form == "all" {
                    Condition::All(children)
                } else {
                    Condition::Any(children)
                }
            }
            None => Condition::malformed(json.clone(), format!("`{form}` expects an array")),
        },
        "not" => Condition::negate(parse_node(body, depth + 1)),
        other => Condition::malformed(json.clone(), format!("unknown condition form `{other}`")),
    }
}

fn parse_pair(form: &str, body: &serde_json::Value) -> Result<(Operand, Operand), ConditionError> {
    match body.as_array().map(Vec::as_slice) {
        Some([a, b]) => Ok((Operand::from_json(a)?, Operand::from_json(b)?)),
        _ => Err(ConditionError::Malformed(format!(
            "`{form}` expects exactly two operands"
        ))),
    }
}

fn strict_eq(a: Option<&Value>, b: Option<&Value>) -> bool {
    matches!((a, b), (Some(x), Some(y)) if x == y)
}

fn strict_ne(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => false,
        (Some(x), Some(y)) => x != y,
        _ => true,
    }
}

fn member(value: Option<&Value>, array: Option<&Value>) -> bool {
    match (value, array) {
        (Some(value), Some(array)) => array.contains(value),
        _ => false,
    }
}

fn validate_operand(operand: &Operand, max_len: usize) -> Result<(), ConditionError> {
    match operand {
        Operand::Path(path) => validate_len(path.len(), max_len),
        Operand::Literal(value) => {
            let mut stack = vec![value];
            while let Some(v) = stack.pop() {
                match v {
                    Value::String(s) => validate_len(s.len(), max_len)?,
                    Value::Array(items) => stack.extend(items),
                    Value::Object(map) => {
                        for (k, v) in map {
                            validate_len(k.len(), max_len)?;
                            stack.push(v);
                        }
                    }
                    _ => {}
                }
            }
            Ok(())
        }
    }
}

fn validate_len(actual: usize, max: usize) -> Result<(), ConditionError> {
    if actual > max {
        Err(ConditionError::StringTooLong { max, actual })
    } else {
        Ok(())
    }
}
