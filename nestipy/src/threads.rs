//! Named threads with bounded joins.
//!
//! `std::thread::JoinHandle::join` blocks forever. Readers stuck on a
//! descriptor some grandchild still holds open must not stall shutdown, so
//! every thread carries a completion channel that can be waited on with a
//! timeout.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct TrackedThread {
    name: String,
    handle: Option<JoinHandle<()>>,
    done: Receiver<()>,
}

impl TrackedThread {
    pub fn spawn<F>(name: impl Into<String>, f: F) -> io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            // Dropped on return or unwind; the receiver sees a disconnect.
            let _done = done_tx;
            f();
        })?;
        Ok(Self {
            name,
            handle: Some(handle),
            done: done_rx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait up to `timeout` for the thread to finish. Returns `false` and
    /// detaches the thread if it is still running.
    pub fn join_timeout(mut self, timeout: Duration) -> bool {
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(thread = %self.name(), "thread still running after {timeout:?}, detaching");
                false
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.reap();
                true
            }
        }
    }

    fn reap(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(thread = %self.name(), "thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn join_timeout_returns_true_for_finished_thread() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let t = TrackedThread::spawn("quick", move || flag.store(true, Ordering::SeqCst)).unwrap();
        assert_eq!(t.name(), "quick");
        assert!(t.join_timeout(Duration::from_secs(5)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn join_timeout_detaches_blocked_thread() {
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let t = TrackedThread::spawn("blocked", move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        assert!(!t.is_finished());
        assert!(!t.join_timeout(Duration::from_millis(50)));
        let _ = release_tx.send(());
    }

    #[test]
    fn panicking_thread_still_counts_as_finished() {
        let t = TrackedThread::spawn("panics", || panic!("boom")).unwrap();
        assert!(t.join_timeout(Duration::from_secs(5)));
    }
}
