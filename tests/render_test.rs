use greenhouse::tpl::path;
use greenhouse::{
    Frame, Greenhouse, GreenhouseOptions, Hook, HookCall, IncludeSet, MemoryLoader, Next, Outcome,
    TemplateError, Value, async_trait, to_value,
};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const TEMPLATES: &str = "tests/resources/templates";

fn engine() -> Greenhouse {
    let options = GreenhouseOptions::new().base_dir(TEMPLATES);
    Greenhouse::new(&options).expect("engine")
}

async fn html(engine: &Greenhouse, template: &str, data: &mut Value) -> String {
    match engine.render(template, data).await {
        Ok(Outcome::Html(html)) => html,
        other => panic!("Expected html, got {:?}", other),
    }
}

#[derive(Serialize)]
struct Page {
    title: String,
    body: String,
}

#[tokio::test]
async fn test_layout_with_nested_include() {
    let page = Page {
        title: "Tom & Jerry".to_string(),
        body: "<p>hi</p>".to_string(),
    };
    let mut data = to_value(&page).unwrap();
    let out = engine()
        .render_file(&format!("{}/layout.html", TEMPLATES), &mut data)
        .await
        .unwrap();
    assert_eq!(
        out,
        Outcome::Html("<html><h1>Tom &amp; Jerry</h1><body><p>hi</p></body></html>\n".into())
    );
}

#[tokio::test]
async fn test_mutual_includes_terminate() {
    let engine = engine();
    let mut data = Value::map();
    assert_eq!(html(&engine, "{{include a.html}}", &mut data).await, "A(B())");

    let out = engine
        .render_file(&format!("{}/a.html", TEMPLATES), &mut Value::map())
        .await
        .unwrap();
    assert_eq!(out, Outcome::Html("A(B())".into()));
}

#[tokio::test]
async fn test_include_expanded_once_per_render() {
    let mut data = Value::map();
    data.insert("items", vec!["x", "y"]);
    let out = html(&engine(), "{{include list.html}}", &mut data).await;
    assert_eq!(out, "<li>x</li>");
}

#[tokio::test]
async fn test_include_soft_failures() {
    let engine = engine();
    let mut data = Value::map();
    let out = html(
        &engine,
        "[{{include ../Cargo.toml}}][{{include missing.html}}][{{include partials/../a.html}}]",
        &mut data,
    )
    .await;
    assert_eq!(out, "[][][]");
}

#[tokio::test]
async fn test_include_raw_and_interpolated_path() {
    let engine = engine();
    let mut data = Value::map();
    data.insert("part", "header");
    data.insert("title", "T");
    let out = html(
        &engine,
        "{{#include raw.txt}}|{{include partials/$(part).html}}",
        &mut data,
    )
    .await;
    assert_eq!(out, "raw {{ not evaluated }}|<h1>T</h1>");
}

#[tokio::test]
async fn test_preseeded_visited_set() {
    let engine = engine();
    let mut visited = IncludeSet::new();
    visited.insert(format!("{}/a.html", TEMPLATES));
    let out = engine
        .render_with_visited("x{{include a.html}}y", &mut Value::map(), &mut visited)
        .await
        .unwrap();
    assert_eq!(out, Outcome::Html("xy".into()));
}

#[tokio::test]
async fn test_compile_error_in_include_aborts() {
    let err = engine()
        .render("before {{include broken.html}} after", &mut Value::map())
        .await
        .unwrap_err();
    let errors = err.compile_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "`if` is never closed");
}

struct Count(Arc<AtomicUsize>);

#[async_trait]
impl Hook for Count {
    async fn call(&self, _frame: &mut Frame<'_>, _call: &HookCall) -> Result<Next, TemplateError> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Next::emit(n.to_string()))
    }
}

struct Fail;

#[async_trait]
impl Hook for Fail {
    async fn call(&self, _frame: &mut Frame<'_>, call: &HookCall) -> Result<Next, TemplateError> {
        Err(TemplateError::Hook(format!("fetch {} failed", call.expr)))
    }
}

#[tokio::test]
async fn test_hook_error_stops_siblings() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = Greenhouse::with_loader(MemoryLoader::new());
    engine
        .register_hook("count", Count(calls.clone()))
        .register_hook("fail", Fail);

    let ok = engine.render("{{count}}-{{count}}", &mut Value::map()).await.unwrap();
    assert_eq!(ok, Outcome::Html("1-2".into()));

    calls.store(0, Ordering::SeqCst);
    let mut data = Value::map();
    data.insert("id", 9);
    let err = engine
        .render(
            "{{count}}{{each list as x}}{{/each}}{{fail /items/:id}}{{count}}{{set after 1}}",
            &mut data,
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Hook error: fetch /items/9 failed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(data.get("after"), None);
}

/// 读取数据并以 JSON 结束渲染
struct JsonOut;

#[async_trait]
impl Hook for JsonOut {
    async fn call(&self, frame: &mut Frame<'_>, call: &HookCall) -> Result<Next, TemplateError> {
        let value = frame.lookup(&call.expr).cloned().unwrap_or_default();
        Ok(Next::Terminate(Outcome::Json(value)))
    }
}

/// 把查询结果写入数据，供后续标签使用
struct Fetch;

#[async_trait]
impl Hook for Fetch {
    async fn call(&self, frame: &mut Frame<'_>, call: &HookCall) -> Result<Next, TemplateError> {
        tokio::task::yield_now().await;
        let mut parts = call.expr.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            return Err(TemplateError::Hook("usage: fetch <name> <url>".into()));
        };
        frame.assign(name, vec![format!("{}#1", url), format!("{}#2", url)]);
        Ok(Next::proceed())
    }
}

#[tokio::test]
async fn test_data_hook_feeds_later_blocks() {
    let mut engine = Greenhouse::with_loader(MemoryLoader::new());
    engine.register_hook("fetch", Fetch).register_hook("json", JsonOut);

    let mut data = Value::map();
    data.insert("kind", "posts");
    let out = engine
        .render(
            "{{fetch rows /api/:kind}}{{each rows as row, n}}{{n}}={{row}} {{/each}}",
            &mut data,
        )
        .await
        .unwrap();
    assert_eq!(
        out,
        Outcome::Html("0=&#x2F;api&#x2F;posts#1 1=&#x2F;api&#x2F;posts#2 ".into())
    );

    let out = engine
        .render("ignored {{fetch rows /x}}{{json rows}} ignored", &mut Value::map())
        .await
        .unwrap();
    let Outcome::Json(value) = out else {
        panic!("Expected json");
    };
    assert_eq!(serde_json::to_string(&value).unwrap(), r#"["/x#1","/x#2"]"#);
}

#[tokio::test]
async fn test_concurrent_renders_are_independent() {
    let engine = Arc::new(engine());
    let tpl = "{{set n :seed}}{{each items as it}}{{it}}{{n}}{{/each}}";

    let mut tasks = Vec::new();
    for seed in 0..4 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let mut data = Value::map();
            data.insert("seed", seed);
            data.insert("items", vec!["a", "b"]);
            engine.render(tpl, &mut data).await.unwrap()
        }));
    }
    for (seed, task) in tasks.into_iter().enumerate() {
        let out = task.await.unwrap();
        assert_eq!(out, Outcome::Html(format!("a{seed}b{seed}")));
    }
}

#[tokio::test]
async fn test_quoted_path_segments() {
    let mut data = Value::map();
    path::write(r#"files."a.txt".size"#, Value::I64(12), &mut data);
    let out = html(
        &engine(),
        r#"{{files."a.txt".size}}{{if files."a.txt".size gt 10}} big{{/if}}"#,
        &mut data,
    )
    .await;
    assert_eq!(out, "12 big");
}

#[tokio::test]
async fn test_escaped_delimiter_kept_literally() {
    let mut data = Value::map();
    data.insert("x", 1);
    let out = html(&engine(), r"\{{x\}} {{x}}", &mut data).await;
    assert_eq!(out, r"\{{x\}} 1");
}
