use proc_macro::TokenStream;

mod assets;

/// 在编译期按 glob 模式嵌入模板文件。
///
/// 展开为 `&[(&str, &str)]`，元素为（相对 `CARGO_MANIFEST_DIR` 的路径，文件内容），
/// 可直接传给 `GreenhouseOptions::assets`。
///
/// ```ignore
/// let options = GreenhouseOptions::new().assets(template_assets!("templates/**/*.html"));
/// ```
#[proc_macro]
pub fn template_assets(input: TokenStream) -> TokenStream {
    assets::template_assets_impl(input)
}
