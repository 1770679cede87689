use glob::glob;
use proc_macro::TokenStream;
use quote::quote;
use std::env;
use std::path::PathBuf;
use syn::{LitStr, parse_macro_input};

pub fn template_assets_impl(input: TokenStream) -> TokenStream {
    // 1. 解析 glob 模式字面量
    let pattern = parse_macro_input!(input as LitStr);
    let pattern_str = pattern.value();

    // 2. 模式相对于调用方 crate 的根目录
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => dir,
        Err(_) => {
            return syn::Error::new(pattern.span(), "CARGO_MANIFEST_DIR is not set")
                .to_compile_error()
                .into();
        }
    };
    let root = PathBuf::from(manifest_dir);
    let full_pattern = root.join(&pattern_str);
    let full_pattern_str = full_pattern.to_string_lossy();

    // 3. 查找匹配的文件，保持确定的顺序
    let mut files: Vec<PathBuf> = match glob(&full_pattern_str) {
        Ok(paths) => paths
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect(),
        Err(e) => {
            return syn::Error::new(pattern.span(), format!("invalid glob pattern: {}", e))
                .to_compile_error()
                .into();
        }
    };
    files.sort();

    // 4. (相对路径, include_str!(绝对路径))
    let assets: Vec<_> = files
        .iter()
        .map(|path| {
            let abs = path.to_string_lossy().to_string();
            let rel = path
                .strip_prefix(&root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            quote! {
                (#rel, include_str!(#abs))
            }
        })
        .collect();

    let output = quote! {
        {
            const __GREENHOUSE_ASSETS: &[(&str, &str)] = &[
                #(#assets),*
            ];
            __GREENHOUSE_ASSETS
        }
    };

    output.into()
}
