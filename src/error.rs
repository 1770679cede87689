use std::fmt;
use thiserror::Error;

/// 词法阶段发现的单个错误，带有在模板中的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl CompileError {
    pub(crate) fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let prefix = &source[..offset.min(source.len())];
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(nl) => prefix[nl + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        Self {
            offset,
            line,
            column,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {}, column {})", self.message, self.line, self.column)
    }
}

/// Represents errors that can terminate a render.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Compile error: {}", join_errors(.0))]
    Compile(Vec<CompileError>),
    #[error("Hook error: {0}")]
    Hook(String),
    #[error("External error: {0}")]
    External(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Value error: {0}")]
    Value(String),
    #[error("General error: {0}")]
    General(String),
}

impl TemplateError {
    /// 供 hook 包装下游错误（例如数据查询失败）
    pub fn external(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        TemplateError::External(Box::new(e))
    }

    pub fn compile_errors(&self) -> &[CompileError] {
        match self {
            TemplateError::Compile(errors) => errors,
            _ => &[],
        }
    }
}

fn join_errors(errors: &[CompileError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl serde::ser::Error for TemplateError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        TemplateError::Value(msg.to_string())
    }
}
