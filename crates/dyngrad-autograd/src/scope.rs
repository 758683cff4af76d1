//! Graph-recording scopes.
//!
//! Recording is a per-thread switch. Guards flip it for a lexical scope and
//! put back whatever state they found, so scopes nest in either direction.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static RECORDING: Cell<bool> = const { Cell::new(true) };
}

/// Whether function calls on this thread currently record graph nodes.
pub fn is_grad_enabled() -> bool {
    RECORDING.with(Cell::get)
}

/// Restores the recording state it replaced when dropped.
///
/// Guards touch thread-local state, so they are `!Send`: a guard must be
/// dropped on the thread that created it.
#[must_use = "recording reverts as soon as the guard is dropped"]
pub struct GradModeGuard {
    restore: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl GradModeGuard {
    /// Switch recording to `enabled` until the guard is dropped.
    pub fn new(enabled: bool) -> Self {
        let restore = RECORDING.with(|r| r.replace(enabled));
        Self {
            restore,
            _thread_bound: PhantomData,
        }
    }

    /// The state that will be restored on drop.
    pub fn restores(&self) -> bool {
        self.restore
    }
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        RECORDING.with(|r| r.set(self.restore));
    }
}

/// Guard that disables graph recording in its scope.
///
/// Values are still computed; outputs simply get no creator, so they act as
/// constants for any later backward pass.
///
/// # Example
/// ```
/// use dyngrad_autograd::{NoGradGuard, Variable};
/// use dyngrad_core::NdArray;
///
/// let x = Variable::new(NdArray::ones([2]).unwrap());
/// let y = {
///     let _guard = NoGradGuard::new();
///     x.exp().unwrap()
/// };
/// assert!(y.creator_name().is_none());
/// ```
#[must_use = "recording reverts as soon as the guard is dropped"]
pub struct NoGradGuard(GradModeGuard);

impl NoGradGuard {
    pub fn new() -> Self {
        Self(GradModeGuard::new(false))
    }
}

impl Default for NoGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `f` with graph recording disabled.
pub fn no_grad<T>(f: impl FnOnce() -> T) -> T {
    let _guard = GradModeGuard::new(false);
    f()
}

/// Run `f` with graph recording enabled, even inside a `no_grad` scope.
pub fn enable_grad<T>(f: impl FnOnce() -> T) -> T {
    let _guard = GradModeGuard::new(true);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_guards_restore_in_order() {
        assert!(is_grad_enabled());
        let outer = NoGradGuard::new();
        assert!(!is_grad_enabled());
        {
            let inner = GradModeGuard::new(true);
            assert!(is_grad_enabled());
            assert!(!inner.restores());
        }
        assert!(!is_grad_enabled());
        drop(outer);
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_closures() {
        assert!(!no_grad(is_grad_enabled));
        assert!(no_grad(|| enable_grad(is_grad_enabled)));
        assert!(is_grad_enabled());
    }

    #[test]
    fn test_state_is_per_thread() {
        let _guard = NoGradGuard::new();
        let other = std::thread::spawn(is_grad_enabled).join().unwrap();
        assert!(other);
        assert!(!is_grad_enabled());
    }

    #[test]
    fn test_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            no_grad(|| panic!("inside scope"));
        });
        assert!(result.is_err());
        assert!(is_grad_enabled());
    }
}
