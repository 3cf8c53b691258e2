//! Background timers.
//!
//! A scheduled task is a thread that sleeps and then posts a
//! [`MutationRequest`] to the session; it never touches UI state itself.
//! Every task owns a [`CancelToken`]. Cancelling wakes the thread so it
//! exits without posting, and a request already in flight is dropped by the
//! session when it finds the token cancelled.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::session::{MutationRequest, Session, SessionHandle};

/// Cooperative cancellation flag shared between a task and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        // The flag is a plain bool; a panicked holder cannot leave it torn.
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cancel(&self) {
        *self.flag() = true;
        self.inner.1.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag()
    }

    /// Sleep for `timeout` or until cancelled. Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.flag();
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            cancelled = match self.inner.1.wait_timeout(cancelled, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// Owner's side of a scheduled task. Dropping it leaves the task running;
/// call [`cancel`](Self::cancel) to stop it.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the task thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    handle: SessionHandle,
}

impl Scheduler {
    pub fn new(handle: SessionHandle) -> Self {
        Self { handle }
    }

    /// Run `task` on the session once, after `delay`.
    pub fn after<F>(&self, delay: Duration, task: F) -> TaskHandle
    where
        F: FnOnce(&mut Session) + Send + 'static,
    {
        let token = CancelToken::new();
        let handle = self.handle.clone();
        let task_token = token.clone();
        let thread = spawn("term-desk-after", move || {
            if task_token.wait_timeout(delay) {
                return;
            }
            handle.post(MutationRequest::Cancellable {
                token: task_token,
                request: Box::new(MutationRequest::Apply(Box::new(task))),
            });
        });
        TaskHandle { token, thread }
    }

    /// Run `task` on the session every `period` until cancelled or the
    /// session goes away.
    pub fn every<F>(&self, period: Duration, task: F) -> TaskHandle
    where
        F: FnMut(&mut Session) + Send + 'static,
    {
        let token = CancelToken::new();
        let handle = self.handle.clone();
        let task_token = token.clone();
        let task = Arc::new(Mutex::new(task));
        let thread = spawn("term-desk-every", move || {
            loop {
                if task_token.wait_timeout(period) {
                    return;
                }
                let task = Arc::clone(&task);
                let run = move |session: &mut Session| {
                    let mut task = task.lock().unwrap_or_else(PoisonError::into_inner);
                    (*task)(session);
                };
                let posted = handle.post(MutationRequest::Cancellable {
                    token: task_token.clone(),
                    request: Box::new(MutationRequest::Apply(Box::new(run))),
                });
                if !posted {
                    return;
                }
            }
        });
        TaskHandle { token, thread }
    }
}

fn spawn(name: &str, body: impl FnOnce() + Send + 'static) -> Option<JoinHandle<()>> {
    match thread::Builder::new().name(name.to_string()).spawn(body) {
        Ok(thread) => Some(thread),
        Err(err) => {
            tracing::warn!(error = %err, task = name, "failed to spawn scheduled task");
            None
        }
    }
}
