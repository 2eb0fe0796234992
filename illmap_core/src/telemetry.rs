//! Minimal run-time metrics sink.
//!
//! The map only emits a handful of counters and gauges (sets, deletes,
//! arena growth, free-list depth). A host embedding the C ABI registers a
//! raw callback and receives `(name, value)` pairs; without a callback the
//! recorder drops everything.

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};
use once_cell::sync::OnceCell;
use std::ffi::CString;
use std::os::raw::{c_char, c_ulonglong};
use std::sync::Arc;

/// Signature for external collectors. `name` is NUL-terminated and only
/// valid for the duration of the call.
pub type StatsCallback = unsafe extern "C" fn(name: *const c_char, value: c_ulonglong);

static CALLBACK: OnceCell<StatsCallback> = OnceCell::new();

/// Register a callback from C/other languages. Only the first call wins.
#[no_mangle]
pub unsafe extern "C" fn illmap_register_stats_callback(cb: StatsCallback) {
    let _ = CALLBACK.set(cb);
}

/// One registered metric; counters, gauges and histograms all forward the
/// same way.
struct Forward {
    name: CString,
}

impl Forward {
    fn handle(key: &Key) -> Arc<Self> {
        let name = CString::new(key.name()).unwrap_or_default();
        Arc::new(Forward { name })
    }

    fn emit(&self, value: u64) {
        if let Some(cb) = CALLBACK.get() {
            unsafe { cb(self.name.as_ptr(), value as c_ulonglong) };
        }
    }
}

impl CounterFn for Forward {
    fn increment(&self, value: u64) {
        self.emit(value);
    }
    fn absolute(&self, value: u64) {
        self.emit(value);
    }
}

impl GaugeFn for Forward {
    fn increment(&self, value: f64) {
        self.emit(value as u64);
    }
    fn decrement(&self, value: f64) {
        self.emit(value as u64);
    }
    fn set(&self, value: f64) {
        self.emit(value as u64);
    }
}

impl HistogramFn for Forward {
    fn record(&self, value: f64) {
        self.emit(value as u64);
    }
}

struct FfiRecorder;

impl Recorder for FfiRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Forward::handle(key))
    }
    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Forward::handle(key))
    }
    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Forward::handle(key))
    }
}

/// Install exactly **once**; a recorder the host already set is kept.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = metrics::set_global_recorder(FfiRecorder);
    });
}
