use std::ops::Range;

/// 模板中的一个标签单元；结构化标签（条件、循环）带有嵌套的 `Section`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// 标签自身在源文本中的字节范围；条件和循环覆盖到闭合标签结束
    pub span: Range<usize>,
    pub kind: BlockKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Var {
        placeholder: String,
        unescaped: bool,
    },
    Condition(Condition),
    Loop(Loop),
    Include {
        path: String,
        eval: bool,
    },
    Hook {
        keyword: String,
        raw_expr: String,
    },
}

/// 一段连续的模板正文及其中的标签
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub range: Range<usize>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub negate: bool,
    pub thing: String,
    pub test: Test,
    pub on_true: Section,
    /// 仅在出现 `{{else}}` 时存在
    pub on_false: Option<Section>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Test {
    /// `{{if thing}}`
    Truthy,
    Compare { operator: Operator, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" | "=" | "==" => Some(Operator::Eq),
            "neq" | "!=" | "<>" => Some(Operator::Neq),
            "gt" | ">" => Some(Operator::Gt),
            "lt" | "<" => Some(Operator::Lt),
            "gte" | ">=" => Some(Operator::Gte),
            "lte" | "<=" => Some(Operator::Lte),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub list: String,
    pub iterator: String,
    pub index: Option<String>,
    pub body: Section,
}
