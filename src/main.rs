//! clientlog demo: simulates page sessions against an options file and
//! prints every request the logger would send.
//!
//! Usage: `clientlog [options.json]`. Without a file a `timer` configuration
//! posting to `/clientlog` is used. A delivery thread plays the collector:
//! each request is printed as a JSON line on stdout, then decoded and written
//! to the log. Diagnostics go to stderr (`RUST_LOG`).

use std::rc::Rc;
use std::time::Duration;

use clientlog::core::host::{
    ChannelTransport, ErrorHook, ExternalLogger, HookResult, ManualScheduler, SystemEnvironment,
    TransportRequest, UncaughtError,
};
use clientlog::core::store::{KeyValueStore, MemoryStore};
use clientlog::export::collector::{Collector, SizeAndTimeBarrier};
use clientlog::export::payload::Payload;
use clientlog::util::cleaner::DefaultLogCleaner;
use clientlog::util::constants;
use clientlog::{ClientLogError, ClientLogger, EarlyErrorCapture, Host, Settings};

/// Events the demo collector writes per window before dropping.
const COLLECTOR_EVENTS_PER_WINDOW: usize = 100;
const COLLECTOR_WINDOW: Duration = Duration::from_secs(60);

/// Stand-in for the page's own logger, writing to stderr.
struct PageLogger;

impl ExternalLogger for PageLogger {
    fn enabled(&self) -> bool {
        true
    }

    fn info(&self, message: &str) {
        eprintln!("page info: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("page error: {message}");
    }

    fn log(&self, message: &str) {
        eprintln!("page log: {message}");
    }
}

fn main() {
    init_logging();

    tracing::info!("{} v{} starting", constants::APP_NAME, constants::APP_VERSION);

    let settings = match load_settings(std::env::args().nth(1)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let (transport, requests) = ChannelTransport::new();
    let delivery = std::thread::Builder::new()
        .name("delivery".into())
        .spawn(move || deliver(requests));
    let delivery = match delivery {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("Failed to spawn delivery thread: {}", e);
            std::process::exit(1);
        }
    };

    let store: Rc<dyn KeyValueStore> = Rc::new(MemoryStore::new());
    let result = run_page("first", &settings, &transport, &store)
        .and_then(|()| run_page("second", &settings, &transport, &store));
    drop(transport);

    if let Err(e) = result {
        tracing::error!("Session failed: {}", e);
    }
    if delivery.join().is_err() {
        tracing::error!("Delivery thread panicked");
    }
}

/// Simulate one page load: early error, initialisation, a few log calls,
/// two uncaught errors, timer ticks and unload.
fn run_page(
    name: &str,
    settings: &Settings,
    transport: &ChannelTransport,
    store: &Rc<dyn KeyValueStore>,
) -> Result<(), ClientLogError> {
    tracing::info!("── page {} ──", name);

    let scheduler = Rc::new(ManualScheduler::new());
    let host = Host::new(
        Rc::new(transport.clone()),
        Rc::new(SystemEnvironment::default()),
        scheduler.clone(),
    )
    .with_store(Rc::clone(store));

    let page_hook: Rc<dyn ErrorHook> = Rc::new(|e: &UncaughtError| -> HookResult {
        eprintln!("page onerror: {}", e.message);
        Ok(())
    });
    host.error_hook.set(page_hook);
    host.external_logger.set(Rc::new(PageLogger));

    let capture = EarlyErrorCapture::install(&host.error_hook);
    let _ = host
        .error_hook
        .raise(&UncaughtError::new("bootstrap failed").at("vendor.js", 3));

    let logger = ClientLogger::initialize(settings.clone(), &host, Some(capture))?;
    scheduler.fire_load_complete();

    logger.error(format!("{name}: explicit error"));
    logger.warn(format!("{name}: warning"));
    logger.info(format!("{name}: info"));
    if let Some(page_logger) = host.external_logger.get() {
        page_logger.log(&format!("{name}: routed through the page logger"));
    }
    let _ = host
        .error_hook
        .raise(&UncaughtError::new("undefined is not a function").at("app.js", 42));
    let _ = host
        .error_hook
        .raise(&UncaughtError::new("cannot read property").at("app.js", 57));

    let settle = settings.collection_timer.max(settings.load_flush_delay);
    scheduler.advance(settle + Duration::from_millis(1));
    scheduler.fire_unload();

    tracing::info!(
        "page {} done: {} sent, {} pending, {} uncaught",
        name,
        logger.sent_count(),
        logger.pending(),
        logger.uncaught_error_count()
    );
    Ok(())
}

fn load_settings(path: Option<String>) -> Result<Settings, ClientLogError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            Settings::from_json(&raw)
        }
        None => Settings::from_json(
            r#"{"url":"/clientlog","collectionType":"timer","logLevel":"info"}"#,
        ),
    }
}

fn deliver(requests: crossbeam_channel::Receiver<TransportRequest>) {
    let collector = Collector::new(
        DefaultLogCleaner,
        SizeAndTimeBarrier::new(COLLECTOR_EVENTS_PER_WINDOW, COLLECTOR_WINDOW),
    );
    for request in requests {
        match serde_json::to_string(&request) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("Failed to serialise request: {}", e),
        }
        let body = request.payload.to_form_body();
        let written = collector.ingest(&Payload::from_form_body(&body));
        tracing::debug!("Collector wrote {} events from {}", written, request.url);
    }
}

/// Initialise the tracing subscriber: stderr, filtered by `RUST_LOG`
/// (default: `info`).
fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer as _;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stderr_layer.with_filter(env_filter))
        .init();
}
