use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::TemplateError;
use crate::loader::{FsLoader, MemoryLoader, TemplateLoader};
use crate::models::options::GreenhouseOptions;
use crate::tpl::engine::{Outcome, render_template};
use crate::tpl::hook::{Hook, HookRegistry};
use crate::tpl::path;
use crate::tpl::render::Renderer;
use crate::tpl::render_context::IncludeSet;
use crate::value::Value;

/// 模板引擎入口：持有 hook 表与模板来源。
///
/// 引擎本身不保存任何渲染状态，每次 `render` 都使用独立的渲染帧，
/// 因此同一个实例可以被并发地用于多个渲染。
pub struct Greenhouse {
    hooks: HookRegistry,
    loader: Arc<dyn TemplateLoader>,
    base_dir: Option<String>,
    escape_html: bool,
}

impl Greenhouse {
    /// 按配置创建引擎；配置了嵌入模板或模板目录时使用内存加载器，否则读文件系统
    pub fn new(options: &GreenhouseOptions<'_>) -> Result<Self, TemplateError> {
        let loader: Arc<dyn TemplateLoader> = if options.preloads() {
            let memory = MemoryLoader::new();
            if let Some(assets) = options.assets {
                memory.load_assets(assets);
            }
            if let Some(dir) = options.assets_path {
                memory
                    .load_from_path(Path::new(dir))
                    .map_err(|e| TemplateError::General(e.to_string()))?;
            }
            Arc::new(memory)
        } else {
            Arc::new(FsLoader::new())
        };

        Ok(Self {
            hooks: HookRegistry::new(),
            loader,
            base_dir: options.base_dir.clone(),
            escape_html: options.escape_html,
        })
    }

    pub fn with_loader(loader: impl TemplateLoader + 'static) -> Self {
        Self {
            hooks: HookRegistry::new(),
            loader: Arc::new(loader),
            base_dir: None,
            escape_html: true,
        }
    }

    /// 注册 hook；`{{keyword ...}}` 形式的标签将交给它处理
    pub fn register_hook(&mut self, keyword: impl Into<String>, hook: impl Hook + 'static) -> &mut Self {
        let keyword = keyword.into();
        debug!(keyword = %keyword, "hook registered");
        self.hooks.register(keyword, hook);
        self
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    pub async fn render(&self, template: &str, data: &mut Value) -> Result<Outcome, TemplateError> {
        let mut visited = IncludeSet::new();
        self.render_with_visited(template, data, &mut visited).await
    }

    /// 使用调用方提供的 include 集合渲染，已在集合中的路径不会再被展开
    pub async fn render_with_visited(
        &self,
        template: &str,
        data: &mut Value,
        visited: &mut IncludeSet,
    ) -> Result<Outcome, TemplateError> {
        if let Some(dir) = &self.base_dir {
            if path::read("self.dir", data).is_none() {
                path::write("self.dir", Value::from(dir.as_str()), data);
            }
        }

        let renderer = Renderer::new(&self.hooks, self.loader.as_ref()).escape_html(self.escape_html);
        render_template(&renderer, template, data, visited).await
    }

    /// 通过加载器读取并渲染模板，该模板自身计入 include 集合
    pub async fn render_file(&self, path: &str, data: &mut Value) -> Result<Outcome, TemplateError> {
        if !self.loader.exists(path).await {
            return Err(TemplateError::General(format!("Template not found: {}", path)));
        }
        let template = self.loader.read(path).await?;

        let mut visited = IncludeSet::new();
        visited.insert(path.to_string());
        self.render_with_visited(&template, data, &mut visited).await
    }
}

impl Default for Greenhouse {
    fn default() -> Self {
        Self::with_loader(FsLoader::new())
    }
}
