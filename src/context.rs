//! Dynamically scoped key/value context merged into every log entry.
//!
//! Two independent propagators exist: [`REQUEST_CONTEXT`] for request-level
//! data set by web middleware (path, method, client ip) and [`USER_CONTEXT`]
//! for application-level identity (user id, trace id, session id). Each one
//! keeps a per-thread stack of frames:
//!
//! - [`ContextPropagator::run`] pushes a frame for the duration of a closure.
//! - [`ContextPropagator::scope`] wraps a future so its frame is pushed
//!   around every poll. The frame therefore survives `.await` points and
//!   follows the future when a multi-threaded runtime moves it.
//! - [`ContextPropagator::set`] / [`ContextPropagator::clear`] mutate a single
//!   ambient slot underneath all frames.
//!
//! Inner frames shadow outer frames key by key; keys the inner frame does not
//! mention stay visible.
//!
//! ```
//! use log_collector::context::USER_CONTEXT;
//! use log_collector::metadata;
//!
//! USER_CONTEXT.run(metadata! { "tenant" => "acme" }, || {
//!     USER_CONTEXT.run(metadata! { "user_id" => "u-1" }, || {
//!         let ctx = USER_CONTEXT.get().unwrap();
//!         assert_eq!(ctx["tenant"], "acme");
//!         assert_eq!(ctx["user_id"], "u-1");
//!     });
//! });
//! assert!(USER_CONTEXT.get().is_none());
//! ```

use crate::record::Metadata;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::LocalKey;
use tracing::warn;

#[derive(Default)]
struct ContextStack {
    ambient: Option<Arc<Metadata>>,
    frames: Vec<Arc<Metadata>>,
    warned_ambient: bool,
}

impl ContextStack {
    fn merged(&self) -> Option<Metadata> {
        if self.ambient.is_none() && self.frames.is_empty() {
            return None;
        }
        let mut merged = Metadata::new();
        for frame in self.ambient.iter().chain(self.frames.iter()) {
            for (key, value) in frame.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        Some(merged)
    }
}

thread_local! {
    static REQUEST_STACK: RefCell<ContextStack> = RefCell::new(ContextStack::default());
    static USER_STACK: RefCell<ContextStack> = RefCell::new(ContextStack::default());
}

/// Request-scope context, typically populated by HTTP middleware.
pub static REQUEST_CONTEXT: ContextPropagator = ContextPropagator {
    name: "request",
    stack: &REQUEST_STACK,
};

/// User-scope context, populated by application code after authentication.
pub static USER_CONTEXT: ContextPropagator = ContextPropagator {
    name: "user",
    stack: &USER_STACK,
};

/// One dynamically scoped context store. See the [module docs](self).
pub struct ContextPropagator {
    name: &'static str,
    stack: &'static LocalKey<RefCell<ContextStack>>,
}

impl std::fmt::Debug for ContextPropagator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextPropagator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl ContextPropagator {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run `f` with `data` visible to every log call made inside it.
    ///
    /// The frame is popped when `f` returns or unwinds.
    pub fn run<R>(&self, data: Metadata, f: impl FnOnce() -> R) -> R {
        let _guard = FrameGuard::push(self.stack, Some(Arc::new(data)));
        f()
    }

    /// Wrap `future` so `data` is visible to every log call made while it is
    /// being polled, across suspension points.
    pub fn scope<F: Future>(&self, data: Metadata, future: F) -> Scoped<F> {
        Scoped {
            stack: self.stack,
            frame: Some(Arc::new(data)),
            inner: Box::pin(future),
        }
    }

    /// Wrap `future` with a snapshot of the context active right now.
    ///
    /// Use this before handing a future to `tokio::spawn`, which otherwise
    /// starts the task with no frames.
    pub fn in_current_scope<F: Future>(&self, future: F) -> Scoped<F> {
        Scoped {
            stack: self.stack,
            frame: self.get().map(Arc::new),
            inner: Box::pin(future),
        }
    }

    /// Effective context on this thread, or `None` when nothing is set.
    pub fn get(&self) -> Option<Metadata> {
        self.stack
            .try_with(|stack| stack.borrow().merged())
            .ok()
            .flatten()
    }

    /// Replace the ambient slot for this thread.
    ///
    /// The slot is shared by everything running on the thread, so async tasks
    /// interleaving on one worker see each other's values. Only use this from
    /// plain synchronous code; prefer [`run`](Self::run) or
    /// [`scope`](Self::scope) everywhere else.
    pub fn set(&self, data: Metadata) {
        let first_use = self
            .stack
            .try_with(|stack| {
                let mut stack = stack.borrow_mut();
                stack.ambient = Some(Arc::new(data));
                !std::mem::replace(&mut stack.warned_ambient, true)
            })
            .unwrap_or(false);

        // Outside the borrow: subscribers may read this context while
        // handling the event.
        if first_use {
            warn!(
                propagator = self.name,
                "ambient log context is only safe in synchronous code; use run() or scope() with async tasks"
            );
        }
    }

    /// Empty the ambient slot for this thread. Frames pushed by `run` or
    /// `scope` are not affected.
    pub fn clear(&self) {
        let _ = self.stack.try_with(|stack| stack.borrow_mut().ambient = None);
    }
}

/// Pops everything above the depth recorded at push time.
struct FrameGuard {
    stack: &'static LocalKey<RefCell<ContextStack>>,
    depth: usize,
}

impl FrameGuard {
    fn push(stack: &'static LocalKey<RefCell<ContextStack>>, frame: Option<Arc<Metadata>>) -> Self {
        let depth = stack
            .try_with(|s| {
                let mut s = s.borrow_mut();
                let depth = s.frames.len();
                if let Some(frame) = frame {
                    s.frames.push(frame);
                }
                depth
            })
            .unwrap_or(0);
        FrameGuard { stack, depth }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let depth = self.depth;
        let _ = self.stack.try_with(|s| s.borrow_mut().frames.truncate(depth));
    }
}

/// Future returned by [`ContextPropagator::scope`].
#[must_use = "futures do nothing unless polled"]
pub struct Scoped<F> {
    stack: &'static LocalKey<RefCell<ContextStack>>,
    frame: Option<Arc<Metadata>>,
    inner: Pin<Box<F>>,
}

impl<F: Future> Future for Scoped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let _guard = FrameGuard::push(this.stack, this.frame.clone());
        this.inner.as_mut().poll(cx)
    }
}
