//! Process-exit termination hooks.
//!
//! Each supervised child registers one hook. A hook runs at most once, from
//! whichever path gets there first: handle shutdown, handle drop, Ctrl-C, or
//! `main` right before `process::exit`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, Weak};

type Action = Box<dyn FnOnce() + Send>;

pub struct TerminationHook {
    name: String,
    action: Mutex<Option<Action>>,
}

impl TerminationHook {
    pub fn new<F>(name: impl Into<String>, action: F) -> Arc<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            action: Mutex::new(Some(Box::new(action))),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Option<Action>> {
        self.action.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    /// Run the action if it has not run yet. Returns whether it ran now.
    pub fn fire(&self) -> bool {
        let action = self.slot().take();
        match action {
            Some(action) => {
                tracing::debug!(hook = %self.name, "firing termination hook");
                action();
                true
            }
            None => false,
        }
    }

    /// Drop the action without running it (the child already exited).
    pub fn disarm(&self) -> bool {
        self.slot().take().is_some()
    }
}

/// Once fired, the registry stays closed: hooks registered afterwards run
/// immediately.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Mutex<Vec<Weak<TerminationHook>>>,
    closed: AtomicBool,
}

impl HookRegistry {
    fn hooks(&self) -> MutexGuard<'_, Vec<Weak<TerminationHook>>> {
        self.hooks.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn register(&self, hook: &Arc<TerminationHook>) {
        let mut hooks = self.hooks();
        if self.closed.load(Ordering::Acquire) {
            drop(hooks);
            hook.fire();
            return;
        }
        hooks.retain(|h| h.strong_count() > 0);
        hooks.push(Arc::downgrade(hook));
    }

    /// Fire every live hook and close the registry. Returns how many
    /// actually ran.
    pub fn fire_all(&self) -> usize {
        let live: Vec<Arc<TerminationHook>> = {
            let hooks = self.hooks();
            self.closed.store(true, Ordering::Release);
            hooks.iter().filter_map(Weak::upgrade).collect()
        };
        live.iter().filter(|hook| hook.fire()).count()
    }
}

static REGISTRY: LazyLock<Arc<HookRegistry>> = LazyLock::new(Arc::default);

/// The process-wide registry fired on Ctrl-C and before `process::exit`.
pub fn global() -> Arc<HookRegistry> {
    Arc::clone(&REGISTRY)
}

pub fn fire_all() -> usize {
    REGISTRY.fire_all()
}
