//! Per-thread provider consulted by the thread-context source.

use crate::provider::UnitProvider;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn UnitProvider>>> = const { RefCell::new(None) };
}

/// Install `provider` for the calling thread until the guard is dropped.
pub fn install(provider: Arc<dyn UnitProvider>) -> ContextGuard {
    let previous = CURRENT.with(|current| current.replace(Some(provider)));
    ContextGuard {
        previous,
        _thread_bound: PhantomData,
    }
}

/// Provider installed on the calling thread, if any.
pub fn current() -> Option<Arc<dyn UnitProvider>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Restores the previously installed provider on drop.
#[must_use = "the provider is uninstalled when the guard is dropped"]
pub struct ContextGuard {
    previous: Option<Arc<dyn UnitProvider>>,
    _thread_bound: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}
