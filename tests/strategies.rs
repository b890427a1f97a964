//! End-to-end behaviour of each collection strategy against a simulated page.

mod common;

use std::rc::Rc;
use std::time::Duration;

use clientlog::core::host::SendMode;
use clientlog::core::store::MemoryStore;
use clientlog::util::constants::DEFAULT_STORAGE_KEY;
use common::{messages, Page};

#[test]
fn single_sends_one_request_per_event() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single"}"#);

    logger.error("first");
    logger.error("second");

    let sent = page.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(messages(&sent[0]), ["first"]);
    assert_eq!(messages(&sent[1]), ["second"]);
    assert!(sent.iter().all(|r| r.mode == SendMode::Async));
    assert_eq!(logger.sent_count(), 2);
}

#[test]
fn size_flushes_on_the_threshold_submit() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"size","maxQueueSize":3}"#);

    logger.error("a");
    logger.error("b");
    assert!(page.sent().is_empty());
    assert_eq!(logger.pending(), 2);

    logger.error("c");
    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(messages(&sent[0]), ["a", "b", "c"]);
    assert_eq!(logger.pending(), 0);
}

#[test]
fn timer_sends_nothing_before_the_interval() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"timer","collectionTimer":1000}"#);

    logger.error("a");
    logger.error("b");
    page.scheduler.advance(Duration::from_millis(999));
    assert!(page.sent().is_empty());

    page.scheduler.advance(Duration::from_millis(1));
    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(messages(&sent[0]), ["a", "b"]);
}

#[test]
fn timer_makes_one_call_per_interval_with_events() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"timer","collectionTimer":1000}"#);

    logger.error("one");
    page.scheduler.advance(Duration::from_millis(1000));
    // idle interval sends nothing
    page.scheduler.advance(Duration::from_millis(1000));
    logger.error("two");
    page.scheduler.advance(Duration::from_millis(1000));

    let sent = page.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(messages(&sent[0]), ["one"]);
    assert_eq!(messages(&sent[1]), ["two"]);
}

#[test]
fn timer_flushes_synchronously_on_unload() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"timer"}"#);

    logger.error("late");
    page.scheduler.fire_unload();

    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, SendMode::Sync);
}

#[test]
fn timer_without_unload_flush_keeps_events() {
    let page = Page::new();
    let logger = page.init(
        r#"{"url":"/log","collectionType":"timer","flushMessagesOnUnload":false}"#,
    );

    logger.error("late");
    page.scheduler.fire_unload();

    assert!(page.sent().is_empty());
    assert_eq!(logger.pending(), 1);
}

#[test]
fn unload_sends_everything_once_at_unload() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"unload"}"#);

    logger.error("a");
    logger.error("b");
    page.scheduler.advance(Duration::from_secs(60));
    assert!(page.sent().is_empty());

    page.scheduler.fire_unload();
    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].mode, SendMode::Sync);
    assert_eq!(messages(&sent[0]), ["a", "b"]);
}

#[test]
fn localstorage_defers_events_to_the_next_page() {
    let store = Rc::new(MemoryStore::new());
    let options = r#"{"url":"/log","collectionType":"localstorage"}"#;

    let first = Page::with_store(store.clone());
    let logger = first.init(options);
    first.scheduler.fire_load_complete();
    first.scheduler.advance(Duration::from_secs(5));
    logger.error("from page one");
    logger.error("also page one");
    first.scheduler.fire_unload();

    assert!(first.sent().is_empty());
    assert!(store.raw(DEFAULT_STORAGE_KEY).is_some());
    assert_eq!(logger.pending(), 2);

    let second = Page::with_store(store.clone());
    let _logger = second.init(options);
    second.scheduler.fire_load_complete();
    second.scheduler.advance(Duration::from_millis(499));
    assert!(second.sent().is_empty());

    second.scheduler.advance(Duration::from_millis(1));
    let sent = second.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(messages(&sent[0]), ["from page one", "also page one"]);
    assert!(store.raw(DEFAULT_STORAGE_KEY).is_none());
}

#[test]
fn localstorage_honours_custom_key() {
    let store = Rc::new(MemoryStore::new());
    let page = Page::with_store(store.clone());
    let logger = page.init(r#"{"url":"/log","collectionType":"localstorage","storageKey":"app-log"}"#);

    logger.error("kept");

    assert!(store.raw("app-log").is_some());
    assert!(store.raw(DEFAULT_STORAGE_KEY).is_none());
}

#[test]
fn localstorage_without_store_fails_to_initialise() {
    let page = Page::new();
    let result = clientlog::ClientLogger::initialize(
        common::settings(r#"{"url":"/log","collectionType":"localstorage"}"#),
        &page.host,
        None,
    );
    assert!(matches!(
        result,
        Err(clientlog::ClientLogError::StoreUnavailable)
    ));
}

#[test]
fn page_cap_stops_accepting_events() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","maxEntriesPerPage":2}"#);

    for i in 0..5 {
        logger.error(format!("event {i}"));
    }

    assert_eq!(page.sent().len(), 2);
    assert_eq!(logger.sent_count(), 2);
    assert!(!logger.is_logging_active(clientlog::LogLevel::Error));
}

#[test]
fn events_below_threshold_never_reach_transport() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","logLevel":"warn"}"#);

    logger.info("chatty");
    logger.debug("chattier");
    logger.warn("kept");

    let sent = page.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].payload.get("lvl_1"), Some("warn"));
}

#[test]
fn submit_during_send_goes_to_next_batch() {
    use clientlog::core::host::{Transport, TransportRequest};
    use std::cell::RefCell;

    struct Reentrant {
        logger: RefCell<Option<clientlog::ClientLogger>>,
        seen: RefCell<Vec<Vec<String>>>,
    }

    impl Transport for Reentrant {
        fn send(&self, request: TransportRequest) {
            let first = self.seen.borrow().is_empty();
            self.seen.borrow_mut().push(messages(&request));
            if first {
                if let Some(logger) = self.logger.borrow().as_ref() {
                    logger.error("during send");
                }
            }
        }
    }

    let page = Page::new();
    let transport = Rc::new(Reentrant {
        logger: RefCell::new(None),
        seen: RefCell::new(Vec::new()),
    });
    let mut host = page.host.clone();
    host.transport = transport.clone();

    let logger = clientlog::ClientLogger::initialize(
        common::settings(r#"{"url":"/log","collectionType":"unload"}"#),
        &host,
        None,
    )
    .unwrap();
    *transport.logger.borrow_mut() = Some(logger.clone());

    logger.error("queued");
    logger.flush(SendMode::Async);
    assert_eq!(logger.pending(), 1);
    logger.flush(SendMode::Async);

    let seen = transport.seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ["queued"]);
    assert_eq!(seen[1], ["during send"]);

    transport.logger.borrow_mut().take();
}

#[test]
fn debug_mirrors_every_call_to_console() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","debug":true}"#);

    logger.error("kept");
    logger.info("below threshold");

    let lines = page.env.console_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], (clientlog::LogLevel::Error, "[error] kept".to_owned()));
    assert_eq!(lines[1].0, clientlog::LogLevel::Info);
    assert_eq!(page.sent().len(), 1);
}

#[test]
fn localstorage_recovers_from_unreadable_entry() {
    use clientlog::core::store::KeyValueStore;

    let store = Rc::new(MemoryStore::new());
    store.save(DEFAULT_STORAGE_KEY, Some("{truncated")).unwrap();
    let options = r#"{"url":"/log","collectionType":"localstorage"}"#;

    let first = Page::with_store(store.clone());
    let logger = first.init(options);
    first.scheduler.fire_load_complete();
    first.scheduler.advance(Duration::from_secs(1));
    logger.error("after corruption");
    first.scheduler.fire_unload();
    assert_eq!(logger.pending(), 1);

    let second = Page::with_store(store.clone());
    let _logger = second.init(options);
    second.scheduler.fire_load_complete();
    second.scheduler.advance(Duration::from_secs(1));

    let sent = second.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(messages(&sent[0]), ["after corruption"]);
    assert!(store.raw(DEFAULT_STORAGE_KEY).is_none());
}

#[test]
fn localstorage_drops_events_over_quota() {
    let store = Rc::new(MemoryStore::new().with_quota(200));
    let page = Page::with_store(store.clone());
    let logger = page.init(r#"{"url":"/log","collectionType":"localstorage"}"#);

    logger.error("x".repeat(500));
    assert_eq!(logger.pending(), 0);
    logger.error("fits");
    assert_eq!(logger.pending(), 1);
}

#[test]
fn localstorage_unavailable_store_fails_to_initialise() {
    let page = Page::with_store(Rc::new(MemoryStore::unavailable()));
    let result = clientlog::ClientLogger::initialize(
        common::settings(r#"{"url":"/log","collectionType":"localstorage"}"#),
        &page.host,
        None,
    );
    let err = result.err().unwrap();
    assert!(matches!(err, clientlog::ClientLogError::StoreUnavailable));
    assert!(err.is_configuration());
}

#[test]
fn localstorage_cap_counts_persisted_events() {
    let store = Rc::new(MemoryStore::new());
    let options = r#"{"url":"/log","collectionType":"localstorage","maxEntriesPerPage":3}"#;

    let first = Page::with_store(store.clone());
    let logger = first.init(options);
    logger.error("a");
    logger.error("b");

    let second = Page::with_store(store.clone());
    let logger = second.init(options);
    assert_eq!(logger.pending(), 2);
    logger.error("c");
    logger.error("rejected");
    assert_eq!(logger.pending(), 3);
    assert!(!logger.is_logging_active(clientlog::LogLevel::Error));

    second.scheduler.fire_load_complete();
    second.scheduler.advance(Duration::from_millis(500));
    let sent = second.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(messages(&sent[0]), ["a", "b", "c"]);
    assert_eq!(logger.sent_count(), 3);
    assert!(!logger.is_logging_active(clientlog::LogLevel::Error));
}

#[test]
fn off_level_call_sends_nothing() {
    let page = Page::new();
    let logger = page.init(r#"{"url":"/log","collectionType":"single","logLevel":"trace"}"#);

    logger.log(clientlog::LogLevel::Off, "nothing");

    assert!(page.sent().is_empty());
    assert_eq!(logger.sent_count(), 0);
}
