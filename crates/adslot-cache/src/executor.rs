//! UI executors.
//!
//! Notifications and provider display calls must run on the one thread that
//! owns UI state. These are the executors a host can hand to the cache.

use adslot_core::{Task, UiExecutor};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Treats every caller as the UI thread and runs tasks immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl UiExecutor for InlineExecutor {
    fn is_current(&self) -> bool {
        true
    }

    fn execute(&self, task: Task) {
        task();
    }
}

/// Queues tasks until the host pumps them from its own loop.
///
/// The thread that creates the executor is the UI thread.
pub struct QueuedExecutor {
    owner: ThreadId,
    queue: Mutex<VecDeque<Task>>,
}

impl QueuedExecutor {
    pub fn new() -> Self {
        Self {
            owner: thread::current().id(),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Run queued tasks, including any they enqueue, and return how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            match next {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for QueuedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl UiExecutor for QueuedExecutor {
    fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    fn execute(&self, task: Task) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(task);
    }
}

/// A dedicated OS thread acting as the UI thread.
///
/// The thread exits once the executor is dropped and the queue drains.
pub struct UiThread {
    tx: mpsc::UnboundedSender<Task>,
    thread_id: ThreadId,
}

impl UiThread {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();
        let thread_name = name.to_string();

        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                debug!(thread = %thread_name, "UI thread started");
                while let Some(task) = rx.blocking_recv() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
                        error!(
                            thread = %thread_name,
                            panic = %panic_message(panic.as_ref()),
                            "UI task panicked"
                        );
                    }
                }
                debug!(thread = %thread_name, "UI thread stopped");
            })?;

        Ok(Self {
            tx,
            thread_id: handle.thread().id(),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }
}

impl UiExecutor for UiThread {
    fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    fn execute(&self, task: Task) {
        if self.tx.send(task).is_err() {
            error!("UI thread is gone, dropping task");
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_inline_runs_immediately() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        InlineExecutor.execute(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(InlineExecutor.is_current());
    }

    #[test]
    fn test_queued_defers_until_pumped() {
        let executor = Arc::new(QueuedExecutor::new());
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&hits);
            executor.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(executor.pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        assert_eq!(executor.run_pending(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(executor.pending(), 0);
    }

    #[test]
    fn test_queued_runs_nested_tasks() {
        let executor = Arc::new(QueuedExecutor::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_exec = Arc::clone(&executor);
        let counter = Arc::clone(&hits);
        executor.execute(Box::new(move || {
            let counter = Arc::clone(&counter);
            inner_exec.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));

        assert_eq!(executor.run_pending(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_queued_owner_thread() {
        let executor = Arc::new(QueuedExecutor::new());
        assert!(executor.is_current());

        let remote = Arc::clone(&executor);
        let from_other = thread::spawn(move || remote.is_current()).join().unwrap();
        assert!(!from_other);
    }

    #[test]
    fn test_ui_thread_runs_tasks_on_itself() {
        let ui = Arc::new(UiThread::spawn("test-ui").unwrap());
        assert!(!ui.is_current());

        let (tx, rx) = std::sync::mpsc::channel();
        let probe = Arc::clone(&ui);
        ui.execute(Box::new(move || {
            let _ = tx.send(probe.is_current());
        }));

        let on_ui = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(on_ui);
    }

    #[test]
    fn test_ui_thread_survives_panicking_task() {
        let ui = UiThread::spawn("test-ui-panic").unwrap();
        ui.execute(Box::new(|| panic!("boom")));

        let (tx, rx) = std::sync::mpsc::channel();
        ui.execute(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn std::any::Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
