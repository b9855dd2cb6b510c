//! Per-call execution context: cancellation plus optional progress reporting.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Callback invoked with human-readable progress messages.
pub type ProgressFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Context threaded through every scraping call.
///
/// Carries the caller's cancellation token and an optional progress callback.
/// The callback is best-effort observability: absent or present, it never
/// changes behavior or timing, so it must not block.
#[derive(Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
    progress: Option<ProgressFn>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context governed by the given cancellation token.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Attach a progress callback.
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Derive a context that keeps the progress callback but answers to a
    /// child cancellation token (used for race phases and fan-out).
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            progress: self.progress.clone(),
        }
    }

    /// Report progress, if anyone is listening.
    pub fn report(&self, msg: impl AsRef<str>) {
        if let Some(ref f) = self.progress {
            f(msg.as_ref());
        }
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn report_without_callback_is_a_no_op() {
        let ctx = CallContext::new();
        ctx.report("nothing happens");
    }

    #[test]
    fn report_reaches_callback() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = seen.clone();
        let ctx = CallContext::new()
            .with_progress(move |msg| sink.lock().unwrap().push(msg.to_string()));

        ctx.report("racing 2 strategies");
        assert_eq!(seen.lock().unwrap().as_slice(), ["racing 2 strategies"]);
    }

    #[test]
    fn child_inherits_progress_and_parent_cancellation() {
        let parent = CallContext::new();
        let child = parent.child();
        assert!(!child.is_cancelled());
        parent.cancel_token().cancel();
        assert!(child.is_cancelled());
    }
}
