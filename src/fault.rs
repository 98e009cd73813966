//! Last-resort observer for faults that escaped every local recovery path.
//!
//! A panic on a spawned task does not take the process down, but without a
//! hook it would only reach stderr unstructured. [`install`] routes every
//! panic through `tracing` instead. It never triggers shutdown.

use std::any::Any;
use std::sync::Once;

static INSTALL: Once = Once::new();

/// Installs the process-wide panic hook. Returns `false` if it was already installed.
pub fn install() -> bool {
    let mut installed = false;
    INSTALL.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "<unknown>".to_string());
            let thread = std::thread::current();

            tracing::error!(
                target: "devworker::fault",
                %location,
                thread = thread.name().unwrap_or("<unnamed>"),
                message = %panic_message(info.payload()),
                "Unhandled panic"
            );
        }));
        installed = true;
    });
    installed
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
