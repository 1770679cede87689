pub struct GreenhouseOptions<'a> {
    pub assets: Option<&'a [(&'a str, &'a str)]>, // 模板文件，编译期嵌入（template_assets!）
    pub assets_path: Option<&'a str>,             // 模板目录，从文件系统中预加载
    pub base_dir: Option<String>,                 // 数据中缺少 self.dir 时使用的 include 基准目录
    pub escape_html: bool,                        // 变量输出是否做 HTML 转义
}

impl<'a> GreenhouseOptions<'a> {
    pub fn new() -> Self {
        GreenhouseOptions {
            assets: None,
            assets_path: None,
            base_dir: None,
            escape_html: true,
        }
    }

    pub fn assets(mut self, assets: &'a [(&'a str, &'a str)]) -> Self {
        self.assets = Some(assets);
        self
    }

    pub fn assets_path(mut self, assets_path: &'a str) -> Self {
        self.assets_path = Some(assets_path);
        self
    }

    pub fn base_dir(mut self, base_dir: impl Into<String>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    /// 是否需要预加载到内存
    pub(crate) fn preloads(&self) -> bool {
        self.assets.is_some() || self.assets_path.is_some()
    }
}

impl Default for GreenhouseOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}
