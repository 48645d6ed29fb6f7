//! `fetch_tool_description` as the model sees it: through the engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use zentara_agent::replay::{ScriptedHost, replay_registry};
use zentara_agent::tools::validation::ModeToolValidator;
use zentara_agent::{ContentBlock, Engine, EngineConfig, ResultContent};

const PAGE_SIZE: usize = 50;

fn engine(host: Arc<ScriptedHost>) -> Engine {
    Engine::new(
        EngineConfig::default(),
        replay_registry(&BTreeMap::new(), PAGE_SIZE),
        Arc::new(ModeToolValidator::default()),
        host,
    )
}

/// Run one `fetch_tool_description` call and return the result body.
async fn fetch(engine: &Engine, params: &[(&str, &str)]) -> String {
    engine.begin_turn();
    let writer = engine.writer();
    writer.push(ContentBlock::tool_use(
        "fetch_tool_description",
        params.iter().copied(),
        false,
    ));
    writer.finish();
    engine.present().await;
    engine
        .results()
        .iter()
        .skip(1)
        .filter_map(ResultContent::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn list_counts_every_registered_tool() {
    let host = Arc::new(ScriptedHost::default());
    let engine = engine(host.clone());
    let total = engine.registry().len();

    let text = fetch(&engine, &[("tool_name", "list")]).await;
    assert!(
        text.starts_with(&format!("Available Tools ({total}):")),
        "unexpected listing: {text}"
    );
    assert!(text.contains("- read_file: "));
    assert!(host.asks().is_empty());
    assert_eq!(
        engine.results()[0].as_text(),
        Some("[fetch_tool_description for 'list'] Result:")
    );
}

#[tokio::test]
async fn listing_is_paginated_past_the_page_size() {
    let engine = engine(Arc::new(ScriptedHost::default()));
    let total = engine.registry().len();
    assert!(total > PAGE_SIZE, "registry has only {total} tools");
    let pages = total.div_ceil(PAGE_SIZE);

    let first = fetch(&engine, &[("tool_name", "list")]).await;
    assert!(first.contains(&format!("Page 1 of {pages}.")));
    assert_eq!(first.lines().filter(|line| line.starts_with("- ")).count(), PAGE_SIZE);

    let last = fetch(&engine, &[("tool_name", "all"), ("page", &pages.to_string())]).await;
    assert_eq!(
        last.lines().filter(|line| line.starts_with("- ")).count(),
        total - PAGE_SIZE * (pages - 1)
    );
    assert!(!last.contains("for more."));

    let beyond = fetch(&engine, &[("tool_name", "list"), ("page", &(pages + 1).to_string())]).await;
    assert!(beyond.contains("out of range"));
    assert_eq!(engine.consecutive_mistakes(), 1);
}

#[tokio::test]
async fn lookup_returns_full_documentation() {
    let engine = engine(Arc::new(ScriptedHost::default()));

    let exact = fetch(&engine, &[("tool_name", "read_file")]).await;
    assert!(exact.starts_with("## read_file"));
    assert!(exact.contains("Parameters:"));

    let folded = fetch(&engine, &[("tool_name", "READ_FILE")]).await;
    assert_eq!(folded, exact);

    let leaf = fetch(&engine, &[("tool_name", "lsp_rename")]).await;
    assert!(leaf.contains("newName"));
}

#[tokio::test]
async fn unknown_names_get_suggestions() {
    let engine = engine(Arc::new(ScriptedHost::default()));

    let text = fetch(&engine, &[("tool_name", "temp_breakpoint")]).await;
    assert_eq!(
        text,
        "Tool 'temp_breakpoint' not found. Did you mean:\n- debug_set_temp_breakpoint"
    );

    let capped = fetch(&engine, &[("tool_name", "breakpoint")]).await;
    assert_eq!(capped.matches("\n- ").count(), 5);

    let nothing = fetch(&engine, &[("tool_name", "qqq")]).await;
    assert_eq!(
        nothing,
        "Tool 'qqq' not found. Use tool_name \"list\" to see all available tools."
    );
}

#[tokio::test]
async fn allowed_in_every_mode() {
    let engine = engine(Arc::new(ScriptedHost::default()));
    engine.set_mode("ask");
    let text = fetch(&engine, &[("tool_name", "write_to_file")]).await;
    assert!(text.starts_with("## write_to_file"));
    assert_eq!(engine.consecutive_mistakes(), 0);
}
