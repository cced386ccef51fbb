//! Shared helpers for the integration tests

#![allow(dead_code)]

use state_router::{ActivationError, Init, Initializer, StateData};
use std::sync::{Arc, Mutex};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Initializer that records the state name and its positional args
pub fn recording(log: &Log) -> impl Initializer {
    let log = log.clone();
    move |init: Init| {
        let log = log.clone();
        async move {
            let entry = format!(
                "{}({})",
                init.name(),
                init.args()
                    .iter()
                    .map(|a| a.as_deref().unwrap_or("-"))
                    .collect::<Vec<_>>()
                    .join(",")
            );
            log.lock().unwrap().push(entry);
            init.finish()
        }
    }
}

/// Initializer that yields to the scheduler before completing
pub fn slow(log: &Log) -> impl Initializer {
    let log = log.clone();
    move |init: Init| {
        let log = log.clone();
        async move {
            tokio::task::yield_now().await;
            log.lock().unwrap().push(init.name().to_string());
            init.finish()
        }
    }
}

/// Initializer that always fails
pub fn failing(reason: &'static str) -> impl Initializer {
    move |_init: Init| async move { Err::<StateData, _>(ActivationError::from(anyhow::anyhow!(reason))) }
}

/// Initializer that always redirects to `target`
pub fn redirecting(target: &'static str) -> impl Initializer {
    move |init: Init| async move {
        Err::<StateData, _>(init.redirect(target, state_router::params! {}))
    }
}
