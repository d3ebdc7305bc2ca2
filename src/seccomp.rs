//! This module contains facilities that relate to the seccomp feature of Linux
//! systems. This module is based on the `seccomp_sys` crate which furthur
//! depends on the `libseccomp` native library.
//!
//! Unlike a blacklist of banned syscalls, the filter built here is an
//! allow-list: every syscall not explicitly allowed falls through to the
//! context's *default action*, which is itself profile-dependent (kill the
//! process outright, or permit-and-log).
//!

use std::error::Error;
use std::fmt::{Display, Formatter};

use seccomp_sys::*;

/// The error type used in `seccomp` module.
#[derive(Clone, Copy, Debug)]
pub struct SeccompError {
    errno: i32
}

impl SeccompError {
    /// Create a new `SeccompError` instance.
    pub fn new(errno: i32) -> Self {
        SeccompError { errno }
    }

    /// Get the error number returned by the underlying `libseccomp` library.
    pub fn errno(&self) -> i32 {
        self.errno
    }
}

impl Display for SeccompError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("seccomp error: {}", self.errno))
    }
}

impl Error for SeccompError {
    // Use default trait implementation here.
}

/// The result type used in `seccomp` module.
pub type Result<T> = std::result::Result<T, SeccompError>;

/// `SCMP_ACT_LOG`'s native `libseccomp` action value. The `seccomp_sys` 0.1
/// bindings predate this action's addition to the upstream header, so it is
/// defined here directly rather than silently falling back to
/// `SCMP_ACT_ALLOW` for the `LEARNING` profile.
const SCMP_ACT_LOG_RAW: u32 = 0x7ffc_0000;

/// Represent the default action taken by the filter context on any syscall
/// that is not in the allow-set.
#[derive(Clone, Copy, Debug)]
pub enum DefaultAction {
    /// Kill the calling process immediately, as though it is killed by the
    /// delivery of a `SIGSYS` signal.
    KillProcess,

    /// Permit the syscall, but log the event through the host's audit
    /// surface. Used by the `LEARNING` profile so behavior can be observed
    /// without terminating the child.
    LogAndAllow
}

impl DefaultAction {
    /// Convert the `DefaultAction` enum value into native, libseccomp
    /// compatible format.
    fn as_native(&self) -> u32 {
        match self {
            DefaultAction::KillProcess => SCMP_ACT_KILL_PROCESS,
            DefaultAction::LogAndAllow => SCMP_ACT_LOG_RAW
        }
    }
}

/// Owns a `libseccomp` filter context and releases it on drop, so every
/// return path out of `install_allow_list` — success or failure — frees the
/// context exactly once.
struct FilterContext(scmp_filter_ctx);

impl Drop for FilterContext {
    fn drop(&mut self) {
        unsafe { seccomp_release(self.0) };
    }
}

/// Build and commit an allow-list syscall filter to the calling process.
///
/// `default_action` governs what happens to any syscall not present in
/// `allowed_syscalls`. The filter context is scoped to this call: it is
/// released immediately after `seccomp_load` commits the filter to the
/// kernel (or as soon as an earlier step fails).
pub fn install_allow_list<T>(default_action: DefaultAction, allowed_syscalls: T) -> Result<()>
    where T: IntoIterator<Item = i32> {
    let raw_ctx = unsafe { seccomp_init(default_action.as_native()) };
    if raw_ctx.is_null() {
        return Err(SeccompError::new(-1));
    }
    let ctx = FilterContext(raw_ctx);

    for syscall in allowed_syscalls {
        let ret = unsafe {
            seccomp_rule_add_array(ctx.0, SCMP_ACT_ALLOW, syscall, 0, std::ptr::null())
        };
        if ret < 0 {
            return Err(SeccompError::new(ret));
        }
    }

    let ret = unsafe { seccomp_load(ctx.0) };
    if ret < 0 {
        return Err(SeccompError::new(ret));
    }

    Ok(())
}
