//! Diagnostic capture for value accesses.
//!
//! While [`capture`] runs a closure, every tracing event at INFO or above that
//! the closure emits is recorded into the innermost capture frame instead of
//! going straight to the log. The frames live in a thread-local stack, so
//! nested captures each see only their own events.

use std::cell::RefCell;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Target used when captured diagnostics are re-emitted.
pub const REPLAY_TARGET: &str = "inspector_rs::replay";

thread_local! {
    static CAPTURE_STACK: RefCell<Vec<Vec<Diagnostic>>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn from_level(level: &Level) -> Option<Self> {
        if *level == Level::ERROR {
            Some(Severity::Error)
        } else if *level == Level::WARN {
            Some(Severity::Warning)
        } else if *level == Level::INFO {
            Some(Severity::Info)
        } else {
            None
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One diagnostic emitted during a value access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Target of the original event
    pub target: String,
}

/// Pops the frame on drop so a panicking closure cannot leave it behind.
struct FrameGuard;

impl Drop for FrameGuard {
    fn drop(&mut self) {
        CAPTURE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `f`, collecting the diagnostics it emits.
pub fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<Diagnostic>) {
    CAPTURE_STACK.with(|stack| stack.borrow_mut().push(Vec::new()));
    let guard = FrameGuard;
    let result = f();
    let diagnostics = CAPTURE_STACK.with(|stack| {
        stack
            .borrow_mut()
            .last_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    });
    drop(guard);
    (result, diagnostics)
}

/// True while a capture frame is open on this thread.
pub fn is_capturing() -> bool {
    CAPTURE_STACK.with(|stack| stack.try_borrow().map(|s| !s.is_empty()).unwrap_or(false))
}

/// Re-emit diagnostics to the regular sinks.
pub fn replay(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        match diag.severity {
            Severity::Error => {
                tracing::error!(target: "inspector_rs::replay", origin = %diag.target, "{}", diag.message)
            }
            Severity::Warning => {
                tracing::warn!(target: "inspector_rs::replay", origin = %diag.target, "{}", diag.message)
            }
            Severity::Info => {
                tracing::info!(target: "inspector_rs::replay", origin = %diag.target, "{}", diag.message)
            }
        }
    }
}

/// Per-layer filter for output layers: hides events an open capture will record.
pub fn should_surface(meta: &Metadata<'_>) -> bool {
    !(Severity::from_level(meta.level()).is_some() && is_capturing())
}

/// Tracing layer that feeds the capture stack.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiagnosticCapture;

impl<S: Subscriber> Layer<S> for DiagnosticCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let Some(severity) = Severity::from_level(meta.level()) else {
            return;
        };
        if !is_capturing() {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let diagnostic = Diagnostic {
            severity,
            message: visitor.message,
            target: meta.target().to_string(),
        };

        CAPTURE_STACK.with(|stack| {
            if let Ok(mut stack) = stack.try_borrow_mut() {
                if let Some(frame) = stack.last_mut() {
                    frame.push(diagnostic);
                }
            }
        });
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}
