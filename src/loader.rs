use crate::error::TemplateError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// include 使用的模板来源
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn exists(&self, path: &str) -> bool;

    async fn read(&self, path: &str) -> Result<String, TemplateError>;
}

/// 从文件系统读取模板；相对路径基于 `root`（未设置时基于当前目录）
#[derive(Debug, Clone, Default)]
pub struct FsLoader {
    root: Option<PathBuf>,
}

impl FsLoader {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

#[async_trait]
impl TemplateLoader for FsLoader {
    async fn exists(&self, path: &str) -> bool {
        tokio::fs::metadata(self.resolve(path))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, path: &str) -> Result<String, TemplateError> {
        let bytes = tokio::fs::read(self.resolve(path)).await?;
        String::from_utf8(bytes).map_err(|e| TemplateError::Encoding(format!("{}: {}", path, e)))
    }
}

/// 内存中的模板集合，键为模板路径
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: DashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    pub fn insert(&self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.templates.insert(path.into(), content.into())
    }

    pub fn remove(&self, path: &str) -> Option<String> {
        self.templates.remove(path).map(|(_, content)| content)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 加载编译期嵌入的模板（见 `template_assets!`）
    pub fn load_assets(&self, assets: &[(&str, &str)]) {
        for (path, content) in assets {
            self.insert(*path, *content);
        }
        debug!(count = assets.len(), "embedded templates loaded");
    }

    /// 递归读取目录下的所有文件，键为相对该目录的路径（以 `/` 分隔）
    pub fn load_from_path(&self, dir_path: &Path) -> Result<usize> {
        let mut count = 0;
        for entry in WalkDir::new(dir_path).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let content = fs::read_to_string(path)
                .with_context(|| format!("读取模板失败: {}", path.display()))?;
            let key = path
                .strip_prefix(dir_path)
                .with_context(|| format!("模板不在目录内: {}", path.display()))?
                .to_string_lossy()
                .replace('\\', "/");
            self.insert(key, content);
            count += 1;
        }
        debug!(dir = %dir_path.display(), count, "templates loaded from directory");
        Ok(count)
    }
}

#[async_trait]
impl TemplateLoader for MemoryLoader {
    async fn exists(&self, path: &str) -> bool {
        self.templates.contains_key(path)
    }

    async fn read(&self, path: &str) -> Result<String, TemplateError> {
        self.templates
            .get(path)
            .map(|content| content.value().clone())
            .ok_or_else(|| TemplateError::General(format!("Template not found: {}", path)))
    }
}
