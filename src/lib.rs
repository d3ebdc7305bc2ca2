//! A process sandbox launcher with adaptive telemetry: runs an untrusted
//! native executable inside a namespaced, rlimited, seccomp-filtered child
//! process while a parent supervisor samples CPU, memory, fault, and I/O
//! metrics every 100ms, escalating under the `LEARNING` profile when
//! behavioral thresholds are exceeded, and emits a structured termination
//! report.
//!
//! This crate targets Linux only: every host-surface contract it consumes
//! (`/proc`-shaped process and system introspection, namespace and seccomp
//! syscalls) has no non-Linux equivalent.

#![cfg(target_os = "linux")]

#[macro_use]
extern crate error_chain;
extern crate libc;
extern crate nix;
extern crate procinfo;
extern crate seccomp_sys;

pub mod child;
pub mod metrics;
pub mod misc;
pub mod profile;
pub mod record;
pub mod report;
pub mod rlimits;
pub mod seccomp;
pub mod supervisor;
pub mod syscalls;

pub mod errors {
    error_chain! {
        types {
            Error, ErrorKind, ResultExt, Result;
        }

        foreign_links {
            Io(::std::io::Error);
            Nix(::nix::Error);
            Seccomp(crate::seccomp::SeccompError);
        }

        errors {
            ChildSpawnFailed {
                description("failed to spawn sandboxed child")
            }

            ReportEmitFailed(path: String) {
                description("failed to write termination report")
                display("failed to write termination report to '{}'", path)
            }
        }
    }
}
