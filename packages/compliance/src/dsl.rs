//! Predicate DSL for policy rule conditions.
//!
//! # Grammar
//!
//! ```text
//! expression   := comparison (('&&' | '||') comparison)*
//! comparison   := value (('==' | '!=' | '>' | '<' | '>=' | '<=') value)?
//! value        := identifier | string | number | boolean
//! identifier   := ('resourceType' | 'tenantId' | 'body.' path | 'context.' path | 'metrics.' path)
//! ```
//!
//! # Examples
//!
//! - `resourceType == 'transaction'`
//! - `body.amount > 10000`
//! - `metrics.dailyVelocity > 50000 && resourceType == 'transaction'`

use serde_json::Value as JsonValue;

use crate::types::{EvaluationContext, EvaluationRequest};

/// Context a rule's predicate is evaluated over: `(body, context)`.
pub struct EvalContext<'a> {
    pub resource_type: &'a str,
    pub tenant_id: &'a str,
    pub body: &'a JsonValue,
    pub context: &'a EvaluationContext,
}

impl<'a> EvalContext<'a> {
    pub fn from_request(request: &'a EvaluationRequest) -> Self {
        Self {
            resource_type: &request.resource_type,
            tenant_id: &request.tenant_id,
            body: &request.body,
            context: &request.context,
        }
    }
}

/// A single `==`/`!=`/`>`/`<`/`>=`/`<=` comparison, or none (bare
/// truthiness check).
#[derive(Clone, Copy)]
enum Comparator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    const ALL: [(&'static str, Comparator); 6] = [
        ("==", Comparator::Eq),
        ("!=", Comparator::Ne),
        (">=", Comparator::Ge),
        ("<=", Comparator::Le),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
    ];

    fn apply(self, left: &JsonValue, right: &JsonValue) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparator::Eq => left == right,
            Comparator::Ne => left != right,
            Comparator::Gt => compare_values(left, right) == Greater,
            Comparator::Lt => compare_values(left, right) == Less,
            Comparator::Ge => compare_values(left, right) != Less,
            Comparator::Le => compare_values(left, right) != Greater,
        }
    }
}

/// Evaluate a condition expression. `||` binds loosest, `&&` next, then
/// individual comparisons — so `a && b || c` reads as `(a && b) || c`.
pub fn evaluate(condition: &str, ctx: &EvalContext) -> bool {
    split_top_level(condition, "||")
        .into_iter()
        .any(|clause| evaluate_and_clause(clause, ctx))
}

fn evaluate_and_clause(clause: &str, ctx: &EvalContext) -> bool {
    split_top_level(clause, "&&")
        .into_iter()
        .all(|term| evaluate_comparison(term.trim(), ctx))
}

/// Split on a literal separator only when it actually appears; a clause
/// with no separator is returned unsplit.
fn split_top_level<'a>(expr: &'a str, sep: &str) -> Vec<&'a str> {
    let pieces: Vec<&str> = expr.split(sep).collect();
    if pieces.len() > 1 {
        pieces
    } else {
        vec![expr]
    }
}

fn evaluate_comparison(expr: &str, ctx: &EvalContext) -> bool {
    let found = Comparator::ALL
        .iter()
        .find_map(|&(token, cmp)| expr.find(token).map(|idx| (idx, token, cmp)));

    let Some((idx, token, cmp)) = found else {
        return is_truthy(&resolve_value(expr, ctx));
    };

    let left = resolve_value(expr[..idx].trim(), ctx);
    let right = resolve_value(expr[idx + token.len()..].trim(), ctx);
    cmp.apply(&left, &right)
}

fn resolve_value(token: &str, ctx: &EvalContext) -> JsonValue {
    let token = token.trim();

    match token {
        "resourceType" => return JsonValue::String(ctx.resource_type.to_string()),
        "tenantId" => return JsonValue::String(ctx.tenant_id.to_string()),
        _ => {}
    }

    if let Some(path) = token.strip_prefix("body.") {
        return ctx.body.get(path).cloned().unwrap_or(JsonValue::Null);
    }
    if let Some(path) = token.strip_prefix("metrics.") {
        return ctx
            .context
            .metrics
            .get(path)
            .cloned()
            .unwrap_or(JsonValue::Null);
    }
    if let Some(field) = token.strip_prefix("context.") {
        return match field {
            "user" => ctx.context.user.clone().map(JsonValue::String).unwrap_or(JsonValue::Null),
            "ip" => ctx.context.ip.clone().map(JsonValue::String).unwrap_or(JsonValue::Null),
            "method" => ctx.context.method.clone().map(JsonValue::String).unwrap_or(JsonValue::Null),
            _ => JsonValue::Null,
        };
    }

    if (token.starts_with('\'') && token.ends_with('\''))
        || (token.starts_with('"') && token.ends_with('"'))
    {
        return JsonValue::String(token[1..token.len() - 1].to_string());
    }

    match token.to_lowercase().as_str() {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        "null" => return JsonValue::Null,
        _ => {}
    }

    if let Ok(n) = token.parse::<i64>() {
        return JsonValue::Number(n.into());
    }
    if let Ok(n) = token.parse::<f64>() {
        return serde_json::Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null);
    }

    JsonValue::Null
}

fn compare_values(a: &JsonValue, b: &JsonValue) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (JsonValue::Number(a), JsonValue::Number(b)) => {
            let a_f = a.as_f64().unwrap_or(0.0);
            let b_f = b.as_f64().unwrap_or(0.0);
            a_f.partial_cmp(&b_f).unwrap_or(Ordering::Equal)
        }
        (JsonValue::String(a), JsonValue::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn is_truthy(val: &JsonValue) -> bool {
    match val {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}
