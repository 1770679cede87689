use crate::error::TemplateError;
use crate::tpl::engine::Outcome;
use crate::tpl::render_context::Frame;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// 传给 hook 的标签信息
#[derive(Debug, Clone, PartialEq)]
pub struct HookCall {
    pub keyword: String,
    /// 关键字之后的原始文本
    pub raw_expr: String,
    /// 已替换 `:a.b` / `$(a.b)` 引用后的表达式
    pub expr: String,
}

/// hook 执行完之后渲染如何继续
#[derive(Debug, Clone, PartialEq)]
pub enum Next {
    /// 追加可选的输出片段后继续渲染后续标签
    Continue(Option<String>),
    /// 以给定结果结束整个渲染（重定向、JSON 等），不再输出任何原文
    Terminate(Outcome),
}

impl Next {
    pub fn proceed() -> Self {
        Next::Continue(None)
    }

    pub fn emit(fragment: impl Into<String>) -> Self {
        Next::Continue(Some(fragment.into()))
    }
}

/// 由宿主注册、按标签关键字触发的异步扩展。
///
/// 返回 `Err` 即走错误通道：渲染立即终止，已产生的输出被丢弃。
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, frame: &mut Frame<'_>, call: &HookCall) -> Result<Next, TemplateError>;
}

/// 关键字到 hook 的映射，默认包含内置的 `set`
#[derive(Clone)]
pub struct HookRegistry {
    hooks: HashMap<String, Arc<dyn Hook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("set", SetHook);
        registry
    }

    pub fn empty() -> Self {
        Self {
            hooks: HashMap::new(),
        }
    }

    /// 注册 hook；同名 hook 会被替换并返回旧值
    pub fn register(
        &mut self,
        keyword: impl Into<String>,
        hook: impl Hook + 'static,
    ) -> Option<Arc<dyn Hook>> {
        self.hooks.insert(keyword.into(), Arc::new(hook))
    }

    pub fn get(&self, keyword: &str) -> Option<Arc<dyn Hook>> {
        self.hooks.get(keyword).cloned()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.hooks.contains_key(keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.hooks.keys().map(String::as_str)
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `{{set name value...}}`：把剩余文本原样拼接为字符串写入 `name`
pub struct SetHook;

#[async_trait]
impl Hook for SetHook {
    async fn call(&self, frame: &mut Frame<'_>, call: &HookCall) -> Result<Next, TemplateError> {
        let mut parts = call.expr.split_whitespace();
        let Some(name) = parts.next() else {
            warn!(expr = %call.raw_expr, "`set` without a name is ignored");
            return Ok(Next::proceed());
        };
        let value = Value::Str(parts.collect::<Vec<_>>().join(" "));

        frame.assign(name, value.clone());
        // 同时以原样的 name 作为顶层键
        frame.data_mut().insert(name, value);
        Ok(Next::proceed())
    }
}
