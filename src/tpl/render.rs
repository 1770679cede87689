use crate::error::TemplateError;
use crate::loader::TemplateLoader;
use crate::tpl::ast::{Block, BlockKind};
use crate::tpl::engine::Outcome;
use crate::tpl::eval;
use crate::tpl::hook::{HookCall, HookRegistry, Next};
use crate::tpl::parser::parse_template;
use crate::tpl::render_context::Frame;
use crate::value::Value;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use tracing::{debug, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 一段标签列表渲染结束后的走向
pub(crate) enum Flow {
    Continue,
    Halt(Outcome),
}

/// 模板解释器：按文档顺序逐个处理标签，上一个标签（含其中的 hook、循环体、
/// include）完全结束后才处理下一个
pub(crate) struct Renderer<'e> {
    hooks: &'e HookRegistry,
    loader: &'e dyn TemplateLoader,
    escape_html: bool,
}

impl<'e> Renderer<'e> {
    pub(crate) fn new(hooks: &'e HookRegistry, loader: &'e dyn TemplateLoader) -> Self {
        Self {
            hooks,
            loader,
            escape_html: true,
        }
    }

    pub(crate) fn escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub(crate) fn hooks(&self) -> &HookRegistry {
        self.hooks
    }

    /// 渲染一段标签；调用前帧的游标应位于该段正文的起点，`end` 为正文终点
    pub(crate) fn render_section<'r, 'f: 'r>(
        &'r self,
        blocks: &'r [Block],
        end: usize,
        frame: &'r mut Frame<'f>,
    ) -> BoxFuture<'r, Result<Flow, TemplateError>> {
        Box::pin(async move {
            for block in blocks {
                frame.flush_to(block.span.start);

                match &block.kind {
                    BlockKind::Var {
                        placeholder,
                        unescaped,
                    } => {
                        let escape = self.escape_html && !*unescaped;
                        if let Some(text) = eval::var_output(frame.data(), placeholder, escape) {
                            frame.push(text);
                        }
                        frame.seek(block.span.end);
                    }
                    BlockKind::Condition(condition) => {
                        let branch = if eval::test_condition(condition, frame.data()) {
                            Some(&condition.on_true)
                        } else {
                            condition.on_false.as_ref()
                        };
                        if let Some(section) = branch {
                            frame.seek(section.range.start);
                            let flow = self
                                .render_section(&section.blocks, section.range.end, frame)
                                .await?;
                            if let Flow::Halt(outcome) = flow {
                                return Ok(Flow::Halt(outcome));
                            }
                        }
                        frame.seek(block.span.end);
                    }
                    BlockKind::Loop(each) => {
                        let items = eval::loop_items(frame.data(), &each.list);
                        debug!(list = %each.list, items = items.len(), "loop");
                        for (i, (key, item)) in items.into_iter().enumerate() {
                            frame.assign(&each.iterator, item);
                            if let Some(index) = &each.index {
                                frame.assign(index, key);
                            }
                            frame.assign("i", i);

                            frame.seek(each.body.range.start);
                            let flow = self
                                .render_section(&each.body.blocks, each.body.range.end, frame)
                                .await?;
                            if let Flow::Halt(outcome) = flow {
                                return Ok(Flow::Halt(outcome));
                            }
                        }
                        frame.seek(block.span.end);
                    }
                    BlockKind::Include { path, eval } => {
                        frame.seek(block.span.end);
                        let Some(text) = self.load_include(frame, path).await else {
                            continue;
                        };
                        if !*eval {
                            frame.push(text);
                            continue;
                        }

                        let blocks = parse_template(&text, self.hooks)?;
                        let mut child = frame.child(&text);
                        let flow = self.render_section(&blocks, text.len(), &mut child).await?;
                        let output = match flow {
                            Flow::Halt(outcome) => return Ok(Flow::Halt(outcome)),
                            Flow::Continue => child.finish(),
                        };
                        frame.push(output);
                    }
                    BlockKind::Hook { keyword, raw_expr } => {
                        frame.seek(block.span.end);
                        let Some(hook) = self.hooks.get(keyword) else {
                            warn!(keyword = %keyword, "hook is no longer registered");
                            continue;
                        };
                        let call = HookCall {
                            keyword: keyword.clone(),
                            raw_expr: raw_expr.clone(),
                            expr: eval::interpolate(raw_expr, frame.data()),
                        };
                        match hook.call(frame, &call).await? {
                            Next::Continue(Some(fragment)) => frame.push(fragment),
                            Next::Continue(None) => {}
                            Next::Terminate(outcome) => {
                                debug!(keyword = %keyword, "render terminated by hook");
                                return Ok(Flow::Halt(outcome));
                            }
                        }
                    }
                }
            }

            frame.flush_to(end);
            Ok(Flow::Continue)
        })
    }

    /// 解析并读取 include 的目标；路径穿越、重复（成环）与缺失文件都只记录日志并跳过
    async fn load_include(&self, frame: &mut Frame<'_>, raw_path: &str) -> Option<String> {
        let path = eval::interpolate(raw_path, frame.data());
        if path.contains("..") {
            warn!(path = %path, "include path escapes the template directory");
            return None;
        }

        let full_path = match frame.lookup("self.dir").map(Value::to_string) {
            Some(dir) if !dir.is_empty() => Path::new(&dir)
                .join(path.trim_start_matches('/'))
                .to_string_lossy()
                .into_owned(),
            _ => path,
        };

        if frame.visited().contains(&full_path) {
            warn!(path = %full_path, "include already rendered, skipping");
            return None;
        }
        frame.visited_mut().insert(full_path.clone());

        if !self.loader.exists(&full_path).await {
            warn!(path = %full_path, "include not found");
            return None;
        }
        match self.loader.read(&full_path).await {
            Ok(text) => {
                debug!(path = %full_path, "include loaded");
                Some(text)
            }
            Err(e) => {
                warn!(path = %full_path, error = %e, "include could not be read");
                None
            }
        }
    }
}
