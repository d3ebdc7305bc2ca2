//! Sandbox profiles and the syscall policy each one implies.
//!
//! The three profiles are represented as a plain tagged enum rather than as
//! trait objects: the behavior that varies between them (default filter
//! action, extra allowed syscalls, whether the adaptive policy engine runs)
//! is small and closed, so a `match` on `Profile` is clearer than dynamic
//! dispatch through a `SandboxPolicy` trait.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::seccomp::DefaultAction;

/// The baseline syscalls required for a dynamically linked program to
/// initialize, read/write standard streams, read randomness, and exit.
const BASELINE_SYSCALLS: &[&str] = &[
    "execve", "brk", "mmap", "munmap", "mprotect", "exit_group", "exit",
    "arch_prctl", "write", "writev", "read", "fstat", "lseek", "close",
    "openat", "readlink", "getrandom"
];

/// Isolation and adaptation policy selected for a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    /// Kill the child on any syscall outside the baseline allow-set. No
    /// adaptive policy engine.
    Strict,

    /// Like `Strict`, but additionally allows `getrusage` so the child may
    /// query its own resource usage.
    ResourceAware,

    /// Default action is log-and-allow rather than kill, and the supervisor
    /// runs the adaptive policy engine that can escalate to an early kill.
    Learning
}

impl Profile {
    /// Parse a profile from its CLI spelling (`STRICT`, `RESOURCE-AWARE`,
    /// `LEARNING`). Unknown values are the caller's responsibility to handle
    /// per the invocation surface's documented fallback-to-`STRICT` behavior.
    pub fn parse(s: &str) -> Option<Profile> {
        match s {
            "STRICT" => Some(Profile::Strict),
            "RESOURCE-AWARE" => Some(Profile::ResourceAware),
            "LEARNING" => Some(Profile::Learning),
            _ => None
        }
    }

    /// The canonical display name used in CLI output and in the termination
    /// record's `profile` field.
    pub fn name(&self) -> &'static str {
        match self {
            Profile::Strict => "STRICT",
            Profile::ResourceAware => "RESOURCE-AWARE",
            Profile::Learning => "LEARNING"
        }
    }

    /// Whether the adaptive policy engine runs under this profile.
    pub fn adaptive(&self) -> bool {
        matches!(self, Profile::Learning)
    }

    /// Build the syscall policy (default action + allow-set) for this
    /// profile.
    pub fn syscall_policy(&self) -> SyscallPolicy {
        let mut allow: Vec<String> = BASELINE_SYSCALLS.iter().map(|s| s.to_string()).collect();

        let default_action = match self {
            Profile::Strict => DefaultAction::KillProcess,
            Profile::ResourceAware => {
                allow.push("getrusage".to_string());
                DefaultAction::KillProcess
            },
            Profile::Learning => DefaultAction::LogAndAllow
        };

        SyscallPolicy { default_action, allowed_syscalls: allow }
    }
}

impl FromStr for Profile {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::parse(s).ok_or(())
    }
}

impl Display for Profile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete *default action + allow-set* pair, ready to be handed to the
/// syscall filter installer (C2).
#[derive(Clone, Debug)]
pub struct SyscallPolicy {
    /// What the kernel filter does on any syscall outside `allowed_syscalls`.
    pub default_action: DefaultAction,

    /// The finite set of syscall names the filter permits to execute.
    pub allowed_syscalls: Vec<String>
}

#[cfg(test)]
mod tests {
    use super::Profile;

    #[test]
    fn test_parse_known_profiles() {
        assert_eq!(Profile::parse("STRICT"), Some(Profile::Strict));
        assert_eq!(Profile::parse("RESOURCE-AWARE"), Some(Profile::ResourceAware));
        assert_eq!(Profile::parse("LEARNING"), Some(Profile::Learning));
    }

    #[test]
    fn test_parse_unknown_profile() {
        assert_eq!(Profile::parse("NONSENSE"), None);
    }

    #[test]
    fn test_resource_aware_adds_getrusage() {
        let policy = Profile::ResourceAware.syscall_policy();
        assert!(policy.allowed_syscalls.iter().any(|s| s == "getrusage"));

        let strict_policy = Profile::Strict.syscall_policy();
        assert!(!strict_policy.allowed_syscalls.iter().any(|s| s == "getrusage"));
    }

    #[test]
    fn test_only_learning_is_adaptive() {
        assert!(!Profile::Strict.adaptive());
        assert!(!Profile::ResourceAware.adaptive());
        assert!(Profile::Learning.adaptive());
    }
}
