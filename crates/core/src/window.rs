//! Window capture protection.
//!
//! The application window is kept out of screenshots and the taskbar at all
//! times, except for the short moment in which the application takes a
//! screenshot itself. [`WindowGuard`] owns the protection flag and is the
//! only thing that talks to the window attribute primitives.
//!
//! # Example
//!
//! ```ignore
//! let guard = WindowGuard::new(window);
//! guard.protect()?;
//!
//! {
//!     let _scope = guard.unprotected();
//!     // capture here; protection comes back when `_scope` is dropped
//! }
//! assert!(guard.is_protected());
//! ```

use crate::error::WindowError;
use std::sync::atomic::{AtomicBool, Ordering};

/// Native window attribute primitives.
///
/// Both calls may fail independently.
pub trait WindowAttributes: Send + Sync {
    /// Marks the window content as excluded from screen capture.
    fn set_content_protected(&self, protected: bool) -> Result<(), WindowError>;

    /// Hides the window from the taskbar and window switchers.
    fn set_skip_taskbar(&self, skip: bool) -> Result<(), WindowError>;
}

/// Owner of the window protection flag.
pub struct WindowGuard<W> {
    window: W,
    protected: AtomicBool,
    taskbar_hidden: AtomicBool,
}

impl<W: WindowAttributes> WindowGuard<W> {
    /// Wraps the primitives. The window starts out as unprotected; call
    /// [`protect`](Self::protect) once at startup.
    pub fn new(window: W) -> Self {
        Self {
            window,
            protected: AtomicBool::new(false),
            taskbar_hidden: AtomicBool::new(false),
        }
    }

    /// Hides the window from the taskbar and enables capture protection.
    ///
    /// No-op if the window is already protected. The taskbar attribute is
    /// only ever set once and never reverted. The two primitives fail
    /// independently: a taskbar failure is logged and retried on the next
    /// call, and never keeps capture protection from being applied.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] if capture protection fails; the window then
    /// counts as unprotected.
    pub fn protect(&self) -> Result<(), WindowError> {
        if self.is_protected() {
            return Ok(());
        }

        if !self.taskbar_hidden.load(Ordering::SeqCst) {
            match self.window.set_skip_taskbar(true) {
                Ok(()) => self.taskbar_hidden.store(true, Ordering::SeqCst),
                Err(e) => log::warn!("Could not hide window from the taskbar: {}", e),
            }
        }

        match self.window.set_content_protected(true) {
            Ok(()) => {
                self.protected.store(true, Ordering::SeqCst);
                log::debug!("Window protection enabled");
                Ok(())
            }
            Err(e) => {
                self.protected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Whether the taskbar attribute has been applied successfully.
    pub fn is_taskbar_hidden(&self) -> bool {
        self.taskbar_hidden.load(Ordering::SeqCst)
    }

    /// Clears capture protection. Taskbar visibility is left untouched.
    ///
    /// No-op if the window is already unprotected.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] if the primitive fails. The flag is cleared
    /// anyway since the real window state is unknown.
    pub fn unprotect(&self) -> Result<(), WindowError> {
        if !self.is_protected() {
            return Ok(());
        }

        let result = self.window.set_content_protected(false);
        self.protected.store(false, Ordering::SeqCst);
        if result.is_ok() {
            log::debug!("Window protection lifted");
        }
        result
    }

    /// Lifts protection until the returned scope is dropped.
    ///
    /// A failing unprotect is logged and the scope is still handed out: the
    /// capture goes ahead and protection is re-applied on drop either way.
    pub fn unprotected(&self) -> UnprotectedScope<'_, W> {
        if let Err(e) = self.unprotect() {
            log::warn!("Could not lift window protection before capture: {}", e);
        }
        UnprotectedScope { guard: self }
    }

    /// Current value of the protection flag.
    pub fn is_protected(&self) -> bool {
        self.protected.load(Ordering::SeqCst)
    }

    /// Access to the wrapped primitives.
    pub fn window(&self) -> &W {
        &self.window
    }
}

/// Re-protects the window when dropped, whatever the exit path.
#[must_use = "protection is restored as soon as the scope is dropped"]
pub struct UnprotectedScope<'a, W: WindowAttributes> {
    guard: &'a WindowGuard<W>,
}

impl<W: WindowAttributes> Drop for UnprotectedScope<'_, W> {
    fn drop(&mut self) {
        if let Err(e) = self.guard.protect() {
            log::error!("Failed to restore window protection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWindow {
        calls: Mutex<Vec<(&'static str, bool)>>,
        fail_protect: AtomicBool,
        fail_taskbar: AtomicBool,
    }

    impl RecordingWindow {
        fn calls(&self) -> Vec<(&'static str, bool)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl WindowAttributes for RecordingWindow {
        fn set_content_protected(&self, protected: bool) -> Result<(), WindowError> {
            self.calls.lock().unwrap().push(("protected", protected));
            if protected && self.fail_protect.load(Ordering::SeqCst) {
                return Err(WindowError::ContentProtection {
                    enabled: true,
                    reason: "denied".into(),
                });
            }
            Ok(())
        }

        fn set_skip_taskbar(&self, skip: bool) -> Result<(), WindowError> {
            self.calls.lock().unwrap().push(("skip_taskbar", skip));
            if self.fail_taskbar.load(Ordering::SeqCst) {
                return Err(WindowError::SkipTaskbar {
                    enabled: skip,
                    reason: "denied".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn protect_is_idempotent() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.protect().unwrap();
        guard.protect().unwrap();

        assert!(guard.is_protected());
        assert_eq!(
            guard.window().calls(),
            vec![("skip_taskbar", true), ("protected", true)]
        );
    }

    #[test]
    fn unprotect_never_touches_taskbar() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.protect().unwrap();
        guard.unprotect().unwrap();
        guard.unprotect().unwrap();
        guard.protect().unwrap();

        assert_eq!(
            guard.window().calls(),
            vec![
                ("skip_taskbar", true),
                ("protected", true),
                ("protected", false),
                ("protected", true),
            ]
        );
    }

    #[test]
    fn scope_restores_protection_on_drop() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.protect().unwrap();
        {
            let _scope = guard.unprotected();
            assert!(!guard.is_protected());
        }
        assert!(guard.is_protected());
    }

    #[test]
    fn failed_protect_leaves_flag_down_until_retry_succeeds() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.window().fail_protect.store(true, Ordering::SeqCst);

        assert!(guard.protect().is_err());
        assert!(!guard.is_protected());

        guard.window().fail_protect.store(false, Ordering::SeqCst);
        guard.protect().unwrap();
        assert!(guard.is_protected());
    }

    #[test]
    fn taskbar_failure_does_not_block_content_protection() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.window().fail_taskbar.store(true, Ordering::SeqCst);

        for _ in 0..3 {
            guard.protect().unwrap();
        }

        assert!(guard.is_protected());
        assert!(!guard.is_taskbar_hidden());
        let content_calls: Vec<_> = guard
            .window()
            .calls()
            .into_iter()
            .filter(|(name, _)| *name == "protected")
            .collect();
        assert_eq!(content_calls, vec![("protected", true)]);
    }

    #[test]
    fn taskbar_is_retried_after_a_failure() {
        let guard = WindowGuard::new(RecordingWindow::default());
        guard.window().fail_taskbar.store(true, Ordering::SeqCst);
        guard.protect().unwrap();
        guard.unprotect().unwrap();

        guard.window().fail_taskbar.store(false, Ordering::SeqCst);
        guard.protect().unwrap();

        assert!(guard.is_taskbar_hidden());
        let skips = guard
            .window()
            .calls()
            .into_iter()
            .filter(|(name, _)| *name == "skip_taskbar")
            .count();
        assert_eq!(skips, 2);
    }
}
