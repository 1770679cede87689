use crate::tpl::ast::{Condition, Operator, Test};
use crate::tpl::path;
use crate::value::Value;
use std::cmp::Ordering;

/// HTML 转义 `& < > " ' /`
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            _ => out.push(c),
        }
    }
    out
}

/// 变量标签的输出；缺失、`null` 与空字符串不输出
pub(crate) fn var_output(data: &Value, placeholder: &str, escape: bool) -> Option<String> {
    let text = match path::read(placeholder, data)? {
        Value::Null => return None,
        Value::Str(s) if s.is_empty() => return None,
        value => value.to_string(),
    };
    Some(if escape { html_escape(&text) } else { text })
}

/// 一处 `:a.b` 或 `$(a.b)` 引用在文本中的位置
struct Reference<'t> {
    start: usize,
    end: usize,
    path: &'t str,
}

fn references(text: &str) -> Vec<Reference<'_>> {
    let bytes = text.as_bytes();
    let mut refs = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'$' if bytes.get(pos + 1) == Some(&b'(') => {
                if let Some(close) = text[pos + 2..].find(')') {
                    let end = pos + 2 + close + 1;
                    refs.push(Reference {
                        start: pos,
                        end,
                        path: text[pos + 2..end - 1].trim(),
                    });
                    pos = end;
                    continue;
                }
            }
            b':' if bytes
                .get(pos + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_' || *b == b'"') =>
            {
                let end = scan_path(bytes, pos + 1);
                // 句末的点不属于路径
                let path = text[pos + 1..end].trim_end_matches('.');
                refs.push(Reference {
                    start: pos,
                    end: pos + 1 + path.len(),
                    path,
                });
                pos += 1 + path.len();
                continue;
            }
            _ => {}
        }
        pos += 1;
    }
    refs
}

fn scan_path(bytes: &[u8], mut pos: usize) -> usize {
    let mut in_quote = false;
    while let Some(&b) = bytes.get(pos) {
        match b {
            b'"' => in_quote = !in_quote,
            _ if in_quote => {}
            b'.' | b'_' | b'-' => {}
            _ if b.is_ascii_alphanumeric() => {}
            _ => break,
        }
        pos += 1;
    }
    pos
}

/// 替换文本中的引用，`transform` 决定被引用值如何写入文本
pub fn interpolate_with(text: &str, data: &Value, transform: impl Fn(&Value) -> String) -> String {
    let refs = references(text);
    if refs.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for r in refs {
        out.push_str(&text[last..r.start]);
        if let Some(value) = path::read(r.path, data) {
            out.push_str(&transform(value));
        }
        last = r.end;
    }
    out.push_str(&text[last..]);
    out
}

pub fn interpolate(text: &str, data: &Value) -> String {
    interpolate_with(text, data, Value::to_string)
}

/// 比较右值：整体就是一个引用时保留被引用值的类型，否则按字面量解析
pub(crate) fn resolve_operand(text: &str, data: &Value) -> Value {
    let refs = references(text);
    if let [only] = refs.as_slice() {
        if only.start == 0 && only.end == text.len() {
            return path::read(only.path, data).cloned().unwrap_or_default();
        }
    }
    parse_literal(&interpolate(text, data))
}

/// `true`/`false`/`null`、数字、带引号的字符串，其余原样作为字符串
pub fn parse_literal(s: &str) -> Value {
    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    if let Ok(n) = s.parse::<i64>() {
        return Value::I64(n);
    }
    if let Ok(n) = s.parse::<f64>() {
        if n.is_finite() {
            return Value::F64(n);
        }
    }
    let unquoted = s
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| s.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')));
    Value::Str(unquoted.unwrap_or(s).to_string())
}

pub(crate) fn test_condition(condition: &Condition, data: &Value) -> bool {
    let thing_path = interpolate(&condition.thing, data);
    let thing = path::read(&thing_path, data).cloned().unwrap_or_default();

    let result = match &condition.test {
        Test::Truthy => thing.is_truthy(),
        Test::Compare { operator, value } => {
            let value = resolve_operand(value, data);
            let thing = match value {
                Value::Bool(_) => Value::Bool(thing.is_truthy()),
                _ => thing,
            };
            compare(*operator, &thing, &value)
        }
    };
    result != condition.negate
}

pub fn compare(operator: Operator, left: &Value, right: &Value) -> bool {
    match operator {
        Operator::Eq => loose_eq(left, right),
        Operator::Neq => !loose_eq(left, right),
        Operator::Gt => loose_cmp(left, right) == Some(Ordering::Greater),
        Operator::Lt => loose_cmp(left, right) == Some(Ordering::Less),
        Operator::Gte => matches!(
            loose_cmp(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lte => matches!(
            loose_cmp(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
    }
}

fn is_scalar(v: &Value) -> bool {
    !matches!(v, Value::Null | Value::List(_) | Value::Map(_))
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Decimal(a), Value::Decimal(b)) => a == b,
        (Value::Str(_), Value::Str(_)) => left == right,
        _ if left.as_f64().is_some() || right.as_f64().is_some() => {
            match (numeric(left), numeric(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (Value::Str(_), other) | (other, Value::Str(_)) if is_scalar(other) => {
            left.to_string() == right.to_string()
        }
        _ => left == right,
    }
}

fn loose_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::DateTimeUtc(a), Value::DateTimeUtc(b)) => Some(a.cmp(b)),
        _ => numeric(left)?.partial_cmp(&numeric(right)?),
    }
}

/// 数字或可解析为数字的字符串
fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Str(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

/// 循环的数据源：列表产出（下标, 元素），对象产出（键, 值），其它为空
pub(crate) fn loop_items(data: &Value, list: &str) -> Vec<(Value, Value)> {
    match path::read(list, data) {
        Some(Value::List(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (Value::from(i), item.clone()))
            .collect(),
        Some(Value::Map(m)) => m
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
            .collect(),
        _ => Vec::new(),
    }
}
