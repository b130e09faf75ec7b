//! Output dispatch to pattern matchers
//!
//! Every chunk read from stdout or stderr is decoded and offered, as a whole,
//! to each enabled matcher in registration order. Chunks are not split into
//! lines: a pattern whose text straddles two reads will not match.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::ProcessError;

/// Callback invoked with the chunk text that matched
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

struct Matcher {
    pattern: Regex,
    handler: Handler,
    enabled: AtomicBool,
    once: bool,
}

/// Ordered, append-only list of output matchers
///
/// Indices returned by [`OutputDispatcher::register`] stay valid for the life
/// of the dispatcher. Disabling is permanent.
#[derive(Default)]
pub struct OutputDispatcher {
    matchers: Mutex<Vec<Arc<Matcher>>>,
}

impl OutputDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every chunk matching `pattern`
    pub fn register<F>(&self, pattern: Regex, handler: F) -> usize
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.push(pattern, Arc::new(handler), false)
    }

    /// Register a handler that fires on the first matching chunk only
    pub fn register_once<F>(&self, pattern: Regex, handler: F) -> usize
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.push(pattern, Arc::new(handler), true)
    }

    fn push(&self, pattern: Regex, handler: Handler, once: bool) -> usize {
        let mut matchers = self.matchers.lock();
        matchers.push(Arc::new(Matcher {
            pattern,
            handler,
            enabled: AtomicBool::new(true),
            once,
        }));
        matchers.len() - 1
    }

    /// Disable a matcher; returns whether it was enabled before
    pub fn disable(&self, index: usize) -> bool {
        self.matchers
            .lock()
            .get(index)
            .map(|matcher| matcher.enabled.swap(false, Ordering::AcqRel))
            .unwrap_or(false)
    }

    /// Disable every matcher
    pub fn disable_all(&self) {
        for matcher in self.matchers.lock().iter() {
            matcher.enabled.store(false, Ordering::Release);
        }
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.matchers
            .lock()
            .get(index)
            .map(|matcher| matcher.enabled.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Number of slots ever registered
    pub fn len(&self) -> usize {
        self.matchers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a raw chunk and dispatch it
    pub fn dispatch(&self, chunk: &[u8]) -> usize {
        let text = String::from_utf8_lossy(chunk);
        self.dispatch_text(&text)
    }

    /// Offer `text` to every enabled matcher; returns how many handlers ran
    ///
    /// The lock is released while a handler runs, so handlers may register or
    /// disable matchers, including their own.
    pub fn dispatch_text(&self, text: &str) -> usize {
        let mut fired = 0;
        let mut index = 0;
        loop {
            let matcher = match self.matchers.lock().get(index) {
                Some(matcher) => Arc::clone(matcher),
                None => break,
            };
            index += 1;

            if !matcher.enabled.load(Ordering::Acquire) || !matcher.pattern.is_match(text) {
                continue;
            }
            // stdout and stderr dispatch concurrently; claim the slot before firing
            if matcher.once && !matcher.enabled.swap(false, Ordering::AcqRel) {
                continue;
            }

            trace!(index = index - 1, pattern = %matcher.pattern, "Output matched");
            (matcher.handler)(text);
            fired += 1;
        }
        fired
    }

    /// Wait for the first chunk matching `resolve` or `reject`
    ///
    /// Both registrations are disabled once this future completes or is
    /// dropped. There is no timeout.
    pub async fn wait_for(
        &self,
        resolve: Regex,
        reject: Option<Regex>,
    ) -> Option<Result<String, ProcessError>> {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let mut armed = Armed {
            dispatcher: self,
            indices: Vec::with_capacity(2),
        };

        let resolved = Arc::clone(&tx);
        armed.indices.push(self.register_once(resolve, move |text| {
            if let Some(tx) = resolved.lock().take() {
                let _ = tx.send(Ok(text.to_string()));
            }
        }));

        if let Some(reject) = reject {
            let rejected = Arc::clone(&tx);
            armed.indices.push(self.register_once(reject, move |text| {
                if let Some(tx) = rejected.lock().take() {
                    let _ = tx.send(Err(ProcessError::PatternRejected(text.to_string())));
                }
            }));
        }

        rx.await.ok()
    }
}

/// Disables a `wait_for` pair when it goes out of scope
struct Armed<'a> {
    dispatcher: &'a OutputDispatcher,
    indices: Vec<usize>,
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        for index in &self.indices {
            self.dispatcher.disable(*index);
        }
    }
}

impl std::fmt::Debug for OutputDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputDispatcher")
            .field("matchers", &self.len())
            .finish()
    }
}
