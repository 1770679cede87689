//! 点路径读写：`a.b.c`，双引号内的 `.` 不作分隔（`a."b.c".d`）

use crate::value::Value;

/// 拆分点路径。引号会被去掉；若引号未闭合，则从该引号起按普通 `.` 切分，且保留引号本身
pub(crate) fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    // 当前未闭合引号在 path 中的位置，以及开始该段之前已收集的段数
    let mut quote_at: Option<(usize, usize)> = None;

    for (i, c) in path.char_indices() {
        match c {
            '"' => {
                in_quote = !in_quote;
                quote_at = if in_quote {
                    Some((i, segments.len()))
                } else {
                    None
                };
            }
            '.' if !in_quote => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if let Some((at, kept)) = quote_at {
        segments.truncate(kept);
        let head_start = path[..at].rfind('.').map_or(0, |dot| dot + 1);
        segments.extend(path[head_start..].split('.').map(str::to_string));
        return segments;
    }

    segments.push(current);
    segments
}

/// 读取路径上的值；任一中间值为假（不止是缺失）即返回 `None`
pub fn read<'a>(path: &str, root: &'a Value) -> Option<&'a Value> {
    let mut current = root;
    for segment in split_path(path) {
        if !current.is_truthy() {
            return None;
        }
        current = child(current, &segment)?;
    }
    Some(current)
}

/// 写入路径上的值；中间节点不是对象（或列表）时会被替换为空对象
pub fn write(path: &str, value: Value, root: &mut Value) {
    let segments = split_path(path);
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let next = child_mut(current, segment);
        if !matches!(next, Value::Map(_) | Value::List(_)) {
            *next = Value::map();
        }
        current = next;
    }
    *child_mut(current, last) = value;
}

fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Map(m) => m.get(segment),
        Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(value: &'a mut Value, segment: &str) -> &'a mut Value {
    let index = match &*value {
        Value::List(items) => segment.parse::<usize>().ok().filter(|i| *i < items.len()),
        _ => None,
    };
    match (value, index) {
        (Value::List(items), Some(i)) => &mut items[i],
        (value, _) => {
            if !matches!(value, Value::Map(_)) {
                *value = Value::map();
            }
            let Value::Map(m) = value else {
                unreachable!("value was just replaced with a map");
            };
            m.entry(segment.to_string()).or_insert(Value::Null)
        }
    }
}
