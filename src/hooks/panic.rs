//! Panic hook recording the last fault of the current thread.
//!
//! Each request runs on one thread at a time, so the fault slots are
//! thread-local: whatever is recorded while a request's handler runs is
//! drained by the same thread once the handler returns or unwinds.
//!
//! Panics and faults recorded through [`record_fault`] are kept apart. A
//! panic only counts as the request's fault if it unwinds out of the
//! handler; one the handler caught itself is dropped.

use std::{
    any::Any,
    cell::RefCell,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicBool, Ordering},
};

use super::{Hooks, HooksAlreadyInstalledError};
use crate::{
    fault::{Fault, SourceLocation},
    severity::Severity,
};

static INSTALLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static PANICKED: RefCell<Option<Fault>> = const { RefCell::new(None) };
    static RECORDED: RefCell<Option<Fault>> = const { RefCell::new(None) };
}

pub(super) fn install(hooks: Hooks) -> Result<(), HooksAlreadyInstalledError> {
    if INSTALLED
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(HooksAlreadyInstalledError(hooks));
    }

    let Hooks {
        frame_collector,
        chain_previous,
    } = hooks;
    let previous = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        let message = payload_message(info.payload());
        let location = info
            .location()
            .map_or_else(unknown_location, SourceLocation::from);
        let frames = frame_collector
            .as_ref()
            .map(|collector| collector.collect())
            .unwrap_or_default();

        PANICKED.set(Some(Fault::new(Severity::ERROR, message, location).with_frames(frames)));

        if chain_previous {
            previous(info);
        }
    }));

    Ok(())
}

/// Returns `true` once [`Hooks::install`] has succeeded.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}

/// Records `fault` as the last fault of the current thread, replacing any
/// previous one.
///
/// Hosts with their own notion of fatal runtime errors call this so that
/// those errors reach [`FaultCapture::on_termination`] the same way panics
/// do.
///
/// [`FaultCapture::on_termination`]: crate::capture::FaultCapture::on_termination
pub fn record_fault(fault: Fault) {
    RECORDED.set(Some(fault));
}

/// Drains the faults recorded on the current thread, returning the one from
/// [`record_fault`] if there is one and the last panic otherwise.
pub fn take_last_fault() -> Option<Fault> {
    let recorded = RECORDED.take();
    let panicked = PANICKED.take();
    recorded.or(panicked)
}

/// Result of running a request handler under [`catch_fault`].
#[derive(Debug)]
pub struct Caught<R> {
    /// The handler's return value, `None` if it panicked.
    pub value: Option<R>,
    /// The last fault recorded while the handler ran, if any.
    pub fault: Option<Fault>,
}

/// Runs `f`, catching any panic, and returns its value together with the
/// fault it left behind.
///
/// Faults left over from before the call are discarded first. If `f`
/// returns, only a fault passed to [`record_fault`] is reported. If it
/// panics, the panic is reported, built from the payload alone when the hook
/// is not installed.
pub fn catch_fault<R>(f: impl FnOnce() -> R) -> Caught<R> {
    take_last_fault();

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => {
            PANICKED.take();
            Caught {
                value: Some(value),
                fault: RECORDED.take(),
            }
        }
        Err(payload) => {
            let panicked = PANICKED.take();
            let recorded = RECORDED.take();
            let fault = panicked.or(recorded).unwrap_or_else(|| {
                Fault::new(
                    Severity::ERROR,
                    payload_message(payload.as_ref()),
                    unknown_location(),
                )
            });
            Caught {
                value: None,
                fault: Some(fault),
            }
        }
    }
}

fn unknown_location() -> SourceLocation {
    SourceLocation::new("<unknown>", 0)
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_take() {
        take_last_fault();
        assert!(take_last_fault().is_none());
        record_fault(Fault::new(
            Severity::PARSE,
            "unexpected token",
            SourceLocation::new("routes.rs", 7),
        ));
        let fault = take_last_fault().unwrap();
        assert_eq!(fault.code(), Severity::PARSE);
        assert!(take_last_fault().is_none());
    }

    #[test]
    fn test_catch_fault_success() {
        let caught = catch_fault(|| 7);
        assert_eq!(caught.value, Some(7));
        assert!(caught.fault.is_none());
    }

    #[test]
    fn test_catch_fault_recorded_without_panic() {
        let caught = catch_fault(|| {
            record_fault(Fault::new(
                Severity::CORE_ERROR,
                "startup failed",
                SourceLocation::new("boot.rs", 1),
            ));
        });
        assert_eq!(caught.value, Some(()));
        assert_eq!(caught.fault.unwrap().code(), Severity::CORE_ERROR);
    }

    #[test]
    fn test_catch_fault_ignores_recovered_panics() {
        let caught = catch_fault(|| {
            PANICKED.set(Some(Fault::new(
                Severity::ERROR,
                "handled internally",
                SourceLocation::new("render.rs", 3),
            )));
            "page rendered"
        });
        assert_eq!(caught.value, Some("page rendered"));
        assert!(caught.fault.is_none());
        assert!(take_last_fault().is_none());
    }

    #[test]
    fn test_catch_fault_panic_without_hook() {
        let caught = catch_fault(|| -> u8 { std::panic::panic_any("boom") });
        assert!(caught.value.is_none());
        let fault = caught.fault.unwrap();
        assert_eq!(fault.code(), Severity::ERROR);
        assert_eq!(fault.message(), "boom");
    }

    #[test]
    fn test_payload_message() {
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(payload_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(payload_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(payload_message(boxed.as_ref()), "unknown panic payload");
    }
}
