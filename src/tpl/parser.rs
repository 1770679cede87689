use crate::error::{CompileError, TemplateError};
use crate::tpl::ast::{Block, BlockKind, Condition, Loop, Operator, Section, Test};
use crate::tpl::hook::HookRegistry;
use tracing::debug;

const OPEN: &[u8] = b"{{";
const CLOSE: &[u8] = b"}}";

/// 尚未闭合的条件或循环
struct OpenBlock {
    start: usize,
    body_start: usize,
    kind: OpenKind,
    blocks: Vec<Block>,
    /// 遇到 `{{else}}` 后保存已完成的真分支
    on_true: Option<Section>,
}

enum OpenKind {
    Condition {
        negate: bool,
        thing: String,
        test: Test,
    },
    Loop {
        list: String,
        iterator: String,
        index: Option<String>,
    },
}

impl OpenKind {
    fn name(&self) -> &'static str {
        match self {
            OpenKind::Condition { negate: false, .. } => "if",
            OpenKind::Condition { negate: true, .. } => "unless",
            OpenKind::Loop { .. } => "each",
        }
    }

    fn closed_by(&self, name: &str) -> bool {
        match self {
            OpenKind::Condition { .. } => !matches!(name, "each"),
            OpenKind::Loop { .. } => !matches!(name, "if" | "unless"),
        }
    }
}

struct Tokenizer<'s, 'h> {
    source: &'s str,
    hooks: &'h HookRegistry,
    root: Vec<Block>,
    stack: Vec<OpenBlock>,
    errors: Vec<CompileError>,
}

/// 将模板切分为标签树；任何编译错误都会使整个结果失败
pub fn parse_template(source: &str, hooks: &HookRegistry) -> Result<Vec<Block>, TemplateError> {
    let mut tokenizer = Tokenizer {
        source,
        hooks,
        root: Vec::new(),
        stack: Vec::new(),
        errors: Vec::new(),
    };
    tokenizer.scan();

    if !tokenizer.errors.is_empty() {
        debug!(errors = tokenizer.errors.len(), "template failed to compile");
        return Err(TemplateError::Compile(tokenizer.errors));
    }
    debug!(blocks = tokenizer.root.len(), "template compiled");
    Ok(tokenizer.root)
}

impl<'s, 'h> Tokenizer<'s, 'h> {
    fn scan(&mut self) {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut open: Option<usize> = None;
        let mut pos = 0;

        while pos + 1 < bytes.len() {
            let window = &bytes[pos..pos + 2];
            let escaped = pos > 0 && bytes[pos - 1] == b'\\';

            if window == OPEN && !escaped {
                if let Some(prev) = open {
                    self.error(prev, "tag is not closed before the next `{{`");
                }
                open = Some(pos);
                pos += 2;
                continue;
            }

            if window == CLOSE && !escaped {
                match open.take() {
                    Some(start) => self.tag(start, pos + 2),
                    None => self.error(pos, "unmatched `}}`"),
                }
                pos += 2;
                continue;
            }

            pos += 1;
        }

        if let Some(start) = open {
            self.error(start, "unclosed tag");
        }

        let unclosed: Vec<(usize, &'static str)> = self
            .stack
            .iter()
            .map(|open| (open.start, open.kind.name()))
            .collect();
        for (start, name) in unclosed {
            self.error(start, format!("`{}` is never closed", name));
        }
    }

    fn tag(&mut self, start: usize, end: usize) {
        let source = self.source;
        let inner = source[start + 2..end - 2].trim();
        let keyword = inner.split_whitespace().next().unwrap_or("");
        let rest = inner[keyword.len()..].trim();

        if self.hooks.contains(keyword) {
            self.push(Block {
                span: start..end,
                kind: BlockKind::Hook {
                    keyword: keyword.to_string(),
                    raw_expr: rest.to_string(),
                },
            });
            return;
        }

        match keyword {
            "include" | "#include" => {
                if rest.is_empty() {
                    self.error(start, "`include` requires a path");
                    return;
                }
                self.push(Block {
                    span: start..end,
                    kind: BlockKind::Include {
                        path: rest.to_string(),
                        eval: keyword == "include",
                    },
                });
            }
            "if" | "#if" | "unless" | "#unless" => {
                let negate = keyword.ends_with("unless");
                if let Some(kind) = self.condition(start, negate, rest) {
                    self.open(start, end, kind);
                }
            }
            _ if keyword.eq_ignore_ascii_case("else") => self.otherwise(start, end),
            "each" | "#each" => {
                if let Some(kind) = self.each(start, rest) {
                    self.open(start, end, kind);
                }
            }
            _ if keyword.starts_with('/') => self.close(start, end, &keyword[1..]),
            _ => {
                let (unescaped, placeholder) = match inner.strip_prefix('#') {
                    Some(stripped) => (true, stripped.trim()),
                    None => (false, inner),
                };
                self.push(Block {
                    span: start..end,
                    kind: BlockKind::Var {
                        placeholder: placeholder.to_string(),
                        unescaped,
                    },
                });
            }
        }
    }

    /// `if <thing> [<operator>] [<value ...>]`
    fn condition(&mut self, start: usize, negate: bool, expr: &str) -> Option<OpenKind> {
        let mut tokens = expr.split_whitespace();
        let Some(thing) = tokens.next() else {
            self.error(start, "condition requires an expression");
            return None;
        };
        let rest: Vec<&str> = tokens.collect();

        let test = match rest.as_slice() {
            [] => Test::Truthy,
            [value] => Test::Compare {
                operator: Operator::Eq,
                value: value.to_string(),
            },
            [op, value @ ..] => match Operator::parse(op) {
                Some(operator) => Test::Compare {
                    operator,
                    value: value.join(" "),
                },
                None => {
                    self.error(start, format!("unknown operator `{}`", op));
                    return None;
                }
            },
        };

        Some(OpenKind::Condition {
            negate,
            thing: thing.to_string(),
            test,
        })
    }

    /// `each <list> as <iterator>[, <index>]`
    fn each(&mut self, start: usize, expr: &str) -> Option<OpenKind> {
        let mut tokens = expr.splitn(2, char::is_whitespace);
        let list = tokens.next().unwrap_or("").trim();
        let binding = tokens
            .next()
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix("as"))
            .filter(|rest| rest.starts_with(char::is_whitespace));

        let (list, binding) = match (list, binding) {
            ("", _) | (_, None) => {
                self.error(start, "expected `each <list> as <item>[, <index>]`");
                return None;
            }
            (list, Some(binding)) => (list, binding),
        };

        let mut names = binding.splitn(2, ',').map(str::trim);
        let iterator = names.next().unwrap_or("");
        if iterator.is_empty() {
            self.error(start, "`each` requires an item name");
            return None;
        }
        let index = names.next().filter(|s| !s.is_empty()).map(str::to_string);

        Some(OpenKind::Loop {
            list: list.to_string(),
            iterator: iterator.to_string(),
            index,
        })
    }

    fn open(&mut self, start: usize, end: usize, kind: OpenKind) {
        self.stack.push(OpenBlock {
            start,
            body_start: end,
            kind,
            blocks: Vec::new(),
            on_true: None,
        });
    }

    fn otherwise(&mut self, start: usize, end: usize) {
        let problem = match self.stack.last() {
            None => Some("`else` outside of a condition"),
            Some(OpenBlock {
                kind: OpenKind::Loop { .. },
                ..
            }) => Some("`else` inside `each` is not supported"),
            Some(open) if open.on_true.is_some() => Some("duplicate `else`"),
            Some(_) => None,
        };
        if let Some(message) = problem {
            self.error(start, message);
            return;
        }

        if let Some(open) = self.stack.last_mut() {
            open.on_true = Some(Section {
                range: open.body_start..start,
                blocks: std::mem::take(&mut open.blocks),
            });
            open.body_start = end;
        }
    }

    fn close(&mut self, start: usize, end: usize, name: &str) {
        let Some(open) = self.stack.pop() else {
            self.error(start, format!("unexpected `/{}`", name));
            return;
        };
        if !open.kind.closed_by(name) {
            self.error(
                start,
                format!("`/{}` closes `{}` opened earlier", name, open.kind.name()),
            );
        }

        let section = Section {
            range: open.body_start..start,
            blocks: open.blocks,
        };
        let kind = match open.kind {
            OpenKind::Condition {
                negate,
                thing,
                test,
            } => {
                let (on_true, on_false) = match open.on_true {
                    Some(on_true) => (on_true, Some(section)),
                    None => (section, None),
                };
                BlockKind::Condition(Condition {
                    negate,
                    thing,
                    test,
                    on_true,
                    on_false,
                })
            }
            OpenKind::Loop {
                list,
                iterator,
                index,
            } => BlockKind::Loop(Loop {
                list,
                iterator,
                index,
                body: section,
            }),
        };

        self.push(Block {
            span: open.start..end,
            kind,
        });
    }

    fn push(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(open) => open.blocks.push(block),
            None => self.root.push(block),
        }
    }

    fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.errors
            .push(CompileError::at(self.source, offset, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(tpl: &str) -> Result<Vec<Block>, TemplateError> {
        parse_template(tpl, &HookRegistry::new())
    }

    fn messages(tpl: &str) -> Vec<String> {
        match parse(tpl) {
            Err(TemplateError::Compile(errors)) => errors.into_iter().map(|e| e.message).collect(),
            other => panic!("Expected compile errors, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_text() {
        let blocks = parse("hello world").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_parse_var() {
        let blocks = parse("hello {{ user.name }}!").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].span, 6..21);
        match &blocks[0].kind {
            BlockKind::Var {
                placeholder,
                unescaped,
            } => {
                assert_eq!(placeholder, "user.name");
                assert!(!unescaped);
            }
            other => panic!("Expected Var, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unescaped_var() {
        let blocks = parse("{{#body}}").unwrap();
        assert_eq!(
            blocks[0].kind,
            BlockKind::Var {
                placeholder: "body".into(),
                unescaped: true
            }
        );
    }

    #[test]
    fn test_escaped_delimiters_are_text() {
        let blocks = parse(r"a \{{ b \}} c").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_parse_if_else() {
        let tpl = "{{if a eq 1}}T{{else}}F{{/if}}";
        let blocks = parse(tpl).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].span, 0..tpl.len());
        match &blocks[0].kind {
            BlockKind::Condition(c) => {
                assert!(!c.negate);
                assert_eq!(c.thing, "a");
                assert_eq!(
                    c.test,
                    Test::Compare {
                        operator: Operator::Eq,
                        value: "1".into()
                    }
                );
                assert_eq!(&tpl[c.on_true.range.clone()], "T");
                let on_false = c.on_false.as_ref().unwrap();
                assert_eq!(&tpl[on_false.range.clone()], "F");
            }
            other => panic!("Expected Condition, got {:?}", other),
        }
    }

    #[test]
    fn test_condition_operator_forms() {
        let cases = [
            ("{{if a}}{{/if}}", Test::Truthy),
            (
                "{{unless a 3}}{{/unless}}",
                Test::Compare {
                    operator: Operator::Eq,
                    value: "3".into(),
                },
            ),
            (
                "{{if title != hello big world}}{{/if}}",
                Test::Compare {
                    operator: Operator::Neq,
                    value: "hello big world".into(),
                },
            ),
            (
                "{{#if n >= 2}}{{/if}}",
                Test::Compare {
                    operator: Operator::Gte,
                    value: "2".into(),
                },
            ),
        ];
        for (tpl, expected) in cases {
            let blocks = parse(tpl).unwrap();
            match &blocks[0].kind {
                BlockKind::Condition(c) => assert_eq!(c.test, expected, "{}", tpl),
                other => panic!("Expected Condition, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_parse_nested() {
        let tpl = "{{if x}}<ul>{{each list as item, i}}<li>{{item}}</li>{{/each}}</ul>{{/if}}";
        let blocks = parse(tpl).unwrap();
        assert_eq!(blocks.len(), 1);
        let BlockKind::Condition(c) = &blocks[0].kind else {
            panic!("Expected Condition");
        };
        assert_eq!(c.on_true.blocks.len(), 1);
        let BlockKind::Loop(l) = &c.on_true.blocks[0].kind else {
            panic!("Expected Loop");
        };
        assert_eq!(l.list, "list");
        assert_eq!(l.iterator, "item");
        assert_eq!(l.index.as_deref(), Some("i"));
        assert_eq!(l.body.blocks.len(), 1);
        assert_eq!(&tpl[l.body.range.clone()], "<li>{{item}}</li>");
    }

    #[test]
    fn test_parse_include() {
        let blocks = parse("{{include parts/$(name).html}}{{#include raw.txt}}").unwrap();
        assert_eq!(
            blocks[0].kind,
            BlockKind::Include {
                path: "parts/$(name).html".into(),
                eval: true
            }
        );
        assert_eq!(
            blocks[1].kind,
            BlockKind::Include {
                path: "raw.txt".into(),
                eval: false
            }
        );
    }

    #[test]
    fn test_hook_keyword_takes_priority() {
        let mut hooks = HookRegistry::new();
        hooks.register("include", crate::tpl::hook::SetHook);
        let blocks = parse_template("{{set a 1}}{{include x}}", &hooks).unwrap();
        assert!(blocks
            .iter()
            .all(|b| matches!(b.kind, BlockKind::Hook { .. })));
        match &blocks[0].kind {
            BlockKind::Hook { keyword, raw_expr } => {
                assert_eq!(keyword, "set");
                assert_eq!(raw_expr, "a 1");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_unclosed_tag() {
        assert_eq!(messages("hello {{ name"), vec!["unclosed tag"]);
    }

    #[test]
    fn test_unmatched_close_delimiter() {
        assert_eq!(messages("a }} b"), vec!["unmatched `}}`"]);
    }

    #[test]
    fn test_unclosed_block() {
        assert_eq!(messages("{{if x}}content"), vec!["`if` is never closed"]);
    }

    #[test]
    fn test_improper_nesting() {
        let errors = messages("{{if a}}{{each l as x}}{{/if}}{{/each}}");
        assert_eq!(errors[0], "`/if` closes `each` opened earlier");
    }

    #[test]
    fn test_stray_else_and_close() {
        let errors = messages("{{else}}{{/if}}");
        assert_eq!(errors, vec!["`else` outside of a condition", "unexpected `/if`"]);
    }

    #[test]
    fn test_errors_are_collected() {
        let errors = messages("{{if a}}{{else}}{{ELSE}}{{/if}} {{each x}}{{/each}} {{ tail");
        assert_eq!(
            errors,
            vec![
                "duplicate `else`",
                "expected `each <list> as <item>[, <index>]`",
                "unexpected `/each`",
                "unclosed tag",
            ]
        );
    }
}
