//! A try/recover wrapper around rendering.
//!
//! [`ErrorBoundary`] runs a rendering closure and traps both returned errors
//! and panics.  Once tripped it stays tripped, refusing further renders and
//! offering [`FALLBACK_TEXT`], until [`ErrorBoundary::reset`] is called.

use std::panic::{self, AssertUnwindSafe};

use crate::error::Result;

/// Shown in place of the view after a fault.
pub const FALLBACK_TEXT: &str = "哎呀，出错了！应用程序遇到了一个错误。";

#[derive(Debug, Default)]
pub struct ErrorBoundary {
    fault: Option<String>,
}

impl ErrorBoundary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `view`.  Returns its value, or `None` if it failed or the boundary
    /// is already tripped.
    pub fn render<T, F>(&mut self, view: F) -> Option<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if self.fault.is_some() {
            return None;
        }
        match panic::catch_unwind(AssertUnwindSafe(view)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                tracing::error!(error = %err, "render failed");
                self.fault = Some(err.to_string());
                None
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(panic = %message, "render panicked");
                self.fault = Some(message);
                None
            }
        }
    }

    /// The message of the fault that tripped the boundary.
    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn has_error(&self) -> bool {
        self.fault.is_some()
    }

    /// The text to show instead of the view, while tripped.
    pub fn fallback(&self) -> Option<&'static str> {
        self.fault.as_ref().map(|_| FALLBACK_TEXT)
    }

    /// Re-arm the boundary.
    pub fn reset(&mut self) {
        self.fault = None;
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
