use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use modelkit::{Collection, Model};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Routes library logs to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub type Log = Rc<RefCell<Vec<String>>>;

/// Records every event name fired on `model`.
#[allow(dead_code)]
pub fn record_model(model: &Model) -> Log {
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    model.on("all", move |name, _| sink.borrow_mut().push(name.to_string()), None);
    log
}

/// Records every event name fired on `collection`.
#[allow(dead_code)]
pub fn record_collection(collection: &Collection) -> Log {
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    collection.on("all", move |name, _| sink.borrow_mut().push(name.to_string()), None);
    log
}

#[allow(dead_code)]
pub fn count(log: &Log, name: &str) -> usize {
    log.borrow().iter().filter(|n| *n == name).count()
}
