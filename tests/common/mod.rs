//! Shared page harness for integration tests.
#![allow(dead_code)]

use std::rc::Rc;

use chrono::TimeZone;
use clientlog::core::host::{
    ChannelTransport, HookResult, ManualScheduler, StaticEnvironment, TransportRequest,
    UncaughtError,
};
use clientlog::core::store::MemoryStore;
use clientlog::{ClientLogger, EarlyErrorCapture, Host, Settings};
use crossbeam_channel::Receiver;

/// One simulated page load.
pub struct Page {
    pub host: Host,
    pub scheduler: Rc<ManualScheduler>,
    pub env: Rc<StaticEnvironment>,
    pub requests: Receiver<TransportRequest>,
}

impl Page {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A page sharing `store` with earlier pages.
    pub fn with_store(store: Rc<MemoryStore>) -> Self {
        Self::build(Some(store))
    }

    fn build(store: Option<Rc<MemoryStore>>) -> Self {
        let (transport, requests) = ChannelTransport::new();
        let scheduler = Rc::new(ManualScheduler::new());
        let env = Rc::new(
            StaticEnvironment::new("test-agent/1.0", (1024, 768), (1920, 1040))
                .with_base_path("/app")
                .with_clock(chrono::Utc.with_ymd_and_hms(2024, 1, 15, 10, 23, 45).unwrap()),
        );
        let mut host = Host::new(Rc::new(transport), env.clone(), scheduler.clone());
        if let Some(store) = store {
            host = host.with_store(store);
        }
        Self {
            host,
            scheduler,
            env,
            requests,
        }
    }

    pub fn init(&self, json: &str) -> ClientLogger {
        ClientLogger::initialize(settings(json), &self.host, None).unwrap()
    }

    pub fn init_with_capture(&self, json: &str, capture: EarlyErrorCapture) -> ClientLogger {
        ClientLogger::initialize(settings(json), &self.host, Some(capture)).unwrap()
    }

    /// Raise an uncaught error through the page's error hook slot.
    pub fn raise(&self, message: &str, file: &str, line: u32) {
        let _ = self
            .host
            .error_hook
            .raise(&UncaughtError::new(message).at(file, line));
    }

    /// Requests sent since the last call.
    pub fn sent(&self) -> Vec<TransportRequest> {
        self.requests.try_iter().collect()
    }
}

pub fn settings(json: &str) -> Settings {
    Settings::from_json(json).unwrap()
}

/// Original error hook that counts calls and always fails.
pub fn failing_hook(counter: Rc<std::cell::Cell<usize>>) -> impl Fn(&UncaughtError) -> HookResult {
    move |_| {
        counter.set(counter.get() + 1);
        Err("original hook exploded".into())
    }
}

/// Messages of every event in `request`, in index order.
pub fn messages(request: &TransportRequest) -> Vec<String> {
    (1..)
        .map_while(|i| request.payload.get(&format!("msg_{i}")).map(str::to_owned))
        .collect()
}
