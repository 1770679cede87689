use anyhow::{Context, bail};
use greenhouse::{Greenhouse, GreenhouseOptions, Outcome, Value, to_value};
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt};

/// greenhouse <template> [data.json]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(template_path) = args.next() else {
        bail!("usage: greenhouse <template> [data.json]");
    };

    let mut data = match args.next() {
        Some(data_path) => {
            let raw = std::fs::read_to_string(&data_path)
                .with_context(|| format!("读取数据文件失败: {}", data_path))?;
            let json: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("JSON 解析失败: {}", data_path))?;
            to_value(&json)?
        }
        None => Value::map(),
    };

    // include 相对模板所在目录解析
    let template = Path::new(&template_path);
    let base_dir = template
        .parent()
        .map(|dir| dir.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("模板路径缺少文件名")?;

    let options = GreenhouseOptions::new().base_dir(base_dir.clone());
    let engine = Greenhouse::new(&options)?;
    let key = if base_dir.is_empty() {
        file_name
    } else {
        Path::new(&base_dir).join(file_name).to_string_lossy().into_owned()
    };

    match engine.render_file(&key, &mut data).await? {
        Outcome::Html(html) => print!("{}", html),
        Outcome::Redirect(location) => println!("Location: {}", location),
        Outcome::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
    }
    Ok(())
}
