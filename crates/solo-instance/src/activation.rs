//! Foreground-activation handoff from a secondary to the primary.
//!
//! Windows only lets the foreground process (or one it nominates) bring a
//! window to the front. A secondary launched by the user is in the
//! foreground, so it nominates the primary before forwarding; otherwise the
//! primary would update silently in the background.

use std::sync::Arc;

use crate::error::ActivationError;

/// Grants a process permission to bring itself to the foreground.
pub trait ForegroundActivation: Send + Sync {
    /// Allow process `pid` to take the foreground once.
    fn allow_foreground(&self, pid: u32) -> Result<(), ActivationError>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}

/// For platforms without foreground-switch restrictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivation;

impl ForegroundActivation for NoopActivation {
    fn allow_foreground(&self, _pid: u32) -> Result<(), ActivationError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// `AllowSetForegroundWindow` on behalf of the primary.
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsActivation;

#[cfg(windows)]
impl ForegroundActivation for WindowsActivation {
    fn allow_foreground(&self, pid: u32) -> Result<(), ActivationError> {
        // SAFETY: plain Win32 call taking a process id by value.
        let ok =
            unsafe { windows_sys::Win32::UI::WindowsAndMessaging::AllowSetForegroundWindow(pid) };
        if ok != 0 {
            Ok(())
        } else {
            Err(ActivationError::Denied {
                pid,
                source: std::io::Error::last_os_error(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "allow-set-foreground-window"
    }
}

/// The activation hook for the target platform.
pub fn platform_activation() -> Arc<dyn ForegroundActivation> {
    #[cfg(windows)]
    {
        Arc::new(WindowsActivation)
    }
    #[cfg(not(windows))]
    {
        Arc::new(NoopActivation)
    }
}
