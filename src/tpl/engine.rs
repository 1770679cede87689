use crate::error::TemplateError;
use crate::tpl::parser::parse_template;
use crate::tpl::render::{Flow, Renderer};
use crate::tpl::render_context::{Frame, IncludeSet};
use crate::value::Value;
use tracing::debug;

/// 一次顶层渲染的结束方式（错误通道为 `Err(TemplateError)`）
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Html(String),
    Redirect(String),
    Json(Value),
}

impl Outcome {
    pub fn into_html(self) -> Option<String> {
        match self {
            Outcome::Html(html) => Some(html),
            _ => None,
        }
    }
}

/// 渲染模板。编译错误在产生任何输出之前返回；渲染期错误丢弃已有输出
pub(crate) async fn render_template(
    renderer: &Renderer<'_>,
    template: &str,
    data: &mut Value,
    visited: &mut IncludeSet,
) -> Result<Outcome, TemplateError> {
    let blocks = parse_template(template, renderer.hooks())?;

    let mut frame = Frame::new(template, data, visited);
    match renderer
        .render_section(&blocks, template.len(), &mut frame)
        .await?
    {
        Flow::Halt(outcome) => Ok(outcome),
        Flow::Continue => {
            let html = frame.finish();
            debug!(len = html.len(), "template rendered");
            Ok(Outcome::Html(html))
        }
    }
}
