//! Child Environment Builder (C3).
//!
//! Runs inside the new child, after the supervisor's clone but before
//! handoff to the untrusted binary. Namespace/mount setup and resource caps
//! are best-effort; only the syscall filter commit and the final `execve`
//! are fatal.

use std::ffi::CString;

use log::{info, warn};
use nix::mount::{mount, MsFlags};
use nix::unistd::execve;

use crate::misc::is_valid_c_string;
use crate::profile::Profile;
use crate::rlimits::{setrlimit_hard, Resource};
use crate::seccomp;
use crate::syscalls;

/// Address-space ceiling applied to the child, in bytes (128 MiB).
const ADDRESS_SPACE_LIMIT: u64 = 128 * 1024 * 1024;

/// Stack ceiling applied to the child, in bytes (8 MiB).
const STACK_LIMIT: u64 = 8 * 1024 * 1024;

/// Open file descriptor ceiling applied to the child.
const OPEN_FILES_LIMIT: u64 = 64;

/// Process/thread ceiling applied to the child, to prevent fork storms.
const PROCESS_COUNT_LIMIT: u64 = 20;

/// Build the child's environment and replace its image with `program`.
/// Never returns on success; on failure to `execve`, the caller should exit
/// non-zero.
pub fn enter(profile: Profile, program: &str, args: &[String]) -> ! {
    make_root_private();
    remount_root_readonly();
    apply_resource_caps();
    install_syscall_filter(profile);

    exec(program, args);
}

/// Step 1: mark the root mount propagation as private, recursive, so mount
/// events in the child are not visible to the host. Best-effort: failure is
/// logged and does not stop the sandbox from continuing.
fn make_root_private() {
    let result = mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>
    );
    match result {
        Ok(()) => {
            println!("Root mount propagation set to private, recursive");
            info!("root mount propagation set to private, recursive");
        },
        Err(e) => warn!("failed to set root mount propagation private: {}", e)
    }
}

/// Step 2: remount root read-only, bind. Best-effort.
fn remount_root_readonly() {
    let result = mount(
        Some("/"),
        "/",
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
        None::<&str>
    );
    match result {
        Ok(()) => {
            println!("Filesystem locked");
            info!("filesystem locked (root remounted read-only)");
        },
        Err(e) => warn!("failed to remount root read-only: {}", e)
    }
}

/// Step 3: apply all resource caps. Each cap is set independently; one
/// failure does not prevent the others from being attempted.
fn apply_resource_caps() {
    let caps: &[(Resource, u64, &str)] = &[
        (Resource::AddressSpace, ADDRESS_SPACE_LIMIT, "address space"),
        (Resource::Stack, STACK_LIMIT, "stack"),
        (Resource::OpenFiles, OPEN_FILES_LIMIT, "open files"),
        (Resource::ProcessCount, PROCESS_COUNT_LIMIT, "process count")
    ];

    for (resource, limit, label) in caps {
        if let Err(e) = setrlimit_hard(*resource, *limit) {
            warn!("failed to set {} resource limit: {}", label, e);
        }
    }
}

/// Step 4: commit the profile's syscall filter. Fatal on failure: running
/// an un-filtered child violates the security contract.
fn install_syscall_filter(profile: Profile) {
    println!("Loading Seccomp-BPF Profile: {}...", profile);
    info!("loading seccomp-bpf profile: {}", profile);

    let policy = profile.syscall_policy();
    let ids: Vec<i32> = policy
        .allowed_syscalls
        .iter()
        .filter_map(|name| syscalls::resolve(name))
        .collect();

    if let Err(e) = seccomp::install_allow_list(policy.default_action, ids) {
        eprintln!("fatal: failed to install syscall filter: {}", e);
        std::process::exit(1);
    }
}

/// Step 5: replace the process image with the target binary and argv. Does
/// not return on success.
fn exec(program: &str, args: &[String]) -> ! {
    if !is_valid_c_string(program) {
        eprintln!("fatal: program path contains a NUL byte");
        std::process::exit(1);
    }
    let path = CString::new(program).expect("already validated as a valid C string");

    let mut argv = vec![path.clone()];
    for arg in args {
        if !is_valid_c_string(arg) {
            eprintln!("fatal: argument contains a NUL byte");
            std::process::exit(1);
        }
        argv.push(CString::new(arg.as_str()).expect("already validated as a valid C string"));
    }

    let env: Vec<CString> = std::env::vars()
        .filter(|(k, v)| is_valid_c_string(k) && is_valid_c_string(v))
        .map(|(k, v)| {
            CString::new(format!("{}={}", k, v)).expect("already validated as a valid C string")
        })
        .collect();

    match execve(&path, &argv, &env) {
        Ok(_) => unreachable!("execve returned Ok without replacing the process image"),
        Err(e) => {
            eprintln!("fatal: execve({}) failed: {}", program, e);
            std::process::exit(1);
        }
    }
}
