//! Resolve the stable symbolic syscall names used throughout the allow-set
//! into the numeric syscall identifiers `libseccomp` requires.
//!
//! Allow-set membership is always expressed by name (see
//! [`crate::profile::SyscallPolicy`]); this module is the single place where
//! names are translated to numbers, so the rest of the crate never hardcodes
//! a syscall id.

/// Resolve a syscall's stable symbolic name to its numeric identifier on the
/// running architecture. Returns `None` for names this crate does not know
/// about.
pub fn resolve(name: &str) -> Option<i32> {
    let id = match name {
        "execve" => libc::SYS_execve,
        "brk" => libc::SYS_brk,
        "mmap" => libc::SYS_mmap,
        "munmap" => libc::SYS_munmap,
        "mprotect" => libc::SYS_mprotect,
        "exit_group" => libc::SYS_exit_group,
        "exit" => libc::SYS_exit,
        "arch_prctl" => libc::SYS_arch_prctl,
        "write" => libc::SYS_write,
        "writev" => libc::SYS_writev,
        "read" => libc::SYS_read,
        "fstat" => libc::SYS_fstat,
        "lseek" => libc::SYS_lseek,
        "close" => libc::SYS_close,
        "openat" => libc::SYS_openat,
        "readlink" => libc::SYS_readlink,
        "getrandom" => libc::SYS_getrandom,
        "getrusage" => libc::SYS_getrusage,
        _ => return None
    };

    Some(id as i32)
}

#[cfg(test)]
mod tests {
    use super::resolve;

    #[test]
    fn test_resolves_baseline_syscalls() {
        for name in &[
            "execve", "brk", "mmap", "munmap", "mprotect", "exit_group", "exit",
            "arch_prctl", "write", "writev", "read", "fstat", "lseek", "close",
            "openat", "readlink", "getrandom", "getrusage"
        ] {
            assert!(resolve(name).is_some(), "expected {} to resolve", name);
        }
    }

    #[test]
    fn test_unknown_syscall_name() {
        assert_eq!(resolve("totally_made_up_syscall"), None);
    }
}
