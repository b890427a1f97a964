//! Payloads produced by the logger decode back into the logged events.

mod common;

use clientlog::core::host::SendMode;
use clientlog::export::decode::decode_payload;
use clientlog::export::payload::Payload;
use clientlog::util::cleaner::{DefaultLogCleaner, NoOpLogCleaner};
use clientlog::LogLevel;
use common::Page;

#[test]
fn form_body_decodes_to_logged_events() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"unload","logLevel":"trace"}"#);

    logger.error("failed: a=b & c");
    logger.warn("ünïcode message");
    logger.trace("line one\nline two");
    page.raise("boom", "https://cdn.example/app.js", 17);
    page.scheduler.fire_unload();

    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    let body = sent[0].payload.to_form_body();
    let batch = decode_payload(&Payload::from_form_body(&body), &DefaultLogCleaner);

    let decoded: Vec<_> = batch
        .events
        .iter()
        .map(|e| (e.index, e.level, e.message.as_str()))
        .collect();
    assert_eq!(
        decoded,
        [
            (1, LogLevel::Error, "failed: a=b & c"),
            (2, LogLevel::Warn, "ünïcode message"),
            (3, LogLevel::Trace, "line oneline two"),
            (4, LogLevel::Error, "boom on [https://cdn.example/app.js:17]"),
        ]
    );
    assert_eq!(batch.events[3].file.as_deref(), Some("https://cdn.example/app.js"));
    assert_eq!(batch.events[3].line, Some(17));
    assert!(batch.events.iter().all(|e| e.timestamp == "Mon, 15 Jan 2024 10:23:45 GMT"));

    let infos = &batch.client_infos;
    assert_eq!(infos.user_agent.as_deref(), Some("test-agent/1.0"));
    assert_eq!(infos.base_url.as_deref(), Some("/app"));
    assert_eq!(infos.window_size.as_deref(), Some("1024x768"));
    assert_eq!(infos.screen_size.as_deref(), Some("1920x1040"));
}

#[test]
fn no_op_cleaner_keeps_whitespace() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single"}"#);

    logger.error("  padded\t");

    let sent = page.sent();
    let batch = decode_payload(&sent[0].payload, &NoOpLogCleaner);
    assert_eq!(batch.events[0].message, "  padded\t");
}

#[test]
fn epoch_timestamps_are_sent_as_millis() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","timestampFormat":"epoch"}"#);

    logger.error("x");

    let sent = page.sent();
    assert_eq!(sent[0].payload.get("timestamp_1"), Some("1705314225000"));
}

#[test]
fn stack_is_sent_only_when_enabled() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"unload"}"#);
    logger.error("no stack wanted");
    logger.flush(SendMode::Sync);

    let sent = page.sent();
    let batch = decode_payload(&sent[0].payload, &DefaultLogCleaner);
    assert_eq!(batch.events[0].stack, None);
}

#[test]
fn collector_writes_each_sent_event() {
    use clientlog::export::collector::{Collector, SizeAndTimeBarrier};
    use std::time::Duration;

    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"unload","logLevel":"info"}"#);
    logger.warn("slow response");
    logger.info("ready");
    logger.error("dropped by budget");
    page.scheduler.fire_unload();

    let sent = page.sent();
    let batch = decode_payload(
        &Payload::from_form_body(&sent[0].payload.to_form_body()),
        &DefaultLogCleaner,
    );

    let generous = Collector::default();
    let lines = generous.admit(&batch);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].0, LogLevel::Warn);
    assert_eq!(
        lines[0].1,
        "[/app] [Mon, 15 Jan 2024 10:23:45 GMT | warn] slow response [test-agent/1.0]; Stack: null"
    );

    let strict = Collector::new(DefaultLogCleaner, SizeAndTimeBarrier::new(3, Duration::from_secs(60)));
    assert_eq!(strict.ingest(&sent[0].payload), 3);
    assert_eq!(strict.ingest(&sent[0].payload), 0);
}
