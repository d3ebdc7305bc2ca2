//! Supervisor Loop (C4) — the heart of the system.
//!
//! Spawns the isolated child, drives the 100ms sampling cadence, computes
//! derived metrics, runs the adaptive policy engine, reaps the child, and
//! produces the termination record. Runs inline, single-threaded: this
//! launcher has exactly one child and one caller, so there is no need for
//! a background-thread monitor.

use std::thread;
use std::time::{Duration, Instant};

use log::{info, trace, warn};
use nix::sched::{clone, CloneFlags};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::child;
use crate::errors::*;
use crate::metrics;
use crate::profile::Profile;
use crate::record::{ExitReason, TerminationRecord, TimelineSample, MAX_TIMELINE_SAMPLES};

/// Stack reserved for the cloned child, before it execs the target binary.
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// Sampling cadence.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Cumulative CPU-tick threshold for the adaptive policy engine: about 2
/// seconds of full CPU consumption.
const CPU_TICK_THRESHOLD_FACTOR: u64 = 2;

/// Major fault threshold for the adaptive policy engine.
const MAJOR_FAULT_THRESHOLD: u64 = 1000;

/// RAII guard that kills and reaps the child on drop unless a terminal wait
/// status was already observed. Guarantees the child is never leaked on an
/// early return.
struct WaitPidGuard {
    pid: Pid,
    done: bool
}

impl WaitPidGuard {
    fn new(pid: Pid) -> Self {
        WaitPidGuard { pid, done: false }
    }

    fn mark_done(&mut self) {
        self.done = true;
    }
}

impl Drop for WaitPidGuard {
    fn drop(&mut self) {
        if !self.done {
            let _ = kill(self.pid, Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
        }
    }
}

/// Spawn the sandboxed child and drive it to completion, returning the
/// finished termination record.
pub fn run(profile: Profile, program: &str, args: &[String]) -> Result<TerminationRecord> {
    let t0 = Instant::now();

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    let flags = CloneFlags::CLONE_NEWNS
        | CloneFlags::CLONE_NEWPID
        | CloneFlags::CLONE_NEWIPC
        | CloneFlags::CLONE_NEWUTS
        | CloneFlags::CLONE_NEWUSER;

    let program_owned = program.to_string();
    let args_owned = args.to_vec();
    let child_fn = Box::new(move || -> isize {
        child::enter(profile, &program_owned, &args_owned);
    });

    let pid = unsafe { clone(child_fn, &mut stack, flags, Some(libc::SIGCHLD)) }
        .chain_err(|| "failed to spawn sandboxed child")?;

    println!("Sandboxed child spawned, pid {}", pid.as_raw());
    info!("sandboxed child spawned, pid={}", pid.as_raw());

    let mut guard = WaitPidGuard::new(pid);
    let record = sample_loop(pid, profile, program, t0)?;
    guard.mark_done();

    Ok(record)
}

fn sample_loop(pid: Pid, profile: Profile, program: &str, t0: Instant) -> Result<TerminationRecord> {
    let clock_hz = metrics::clock_tick_hz();
    let cores = metrics::core_count();
    let cpu_tick_threshold = clock_hz * CPU_TICK_THRESHOLD_FACTOR;

    let mut timeline: Vec<TimelineSample> = Vec::new();
    let mut prev_process_ticks: Option<u64> = None;
    let mut prev_system_ticks: Option<u64> = None;

    let mut peak_memory_kb = 0u64;
    let mut peak_cpu = 0u64;
    let mut page_faults_minor = 0u64;
    let mut page_faults_major = 0u64;
    let mut read_syscalls = 0u64;
    let mut write_syscalls = 0u64;
    let mut adaptive_kill = false;

    let exit_reason = loop {
        trace!("supervisor tick: calling waitpid(pid={}, WNOHANG)", pid.as_raw());
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => (),
            Ok(status) => {
                trace!("supervisor tick: wait status {:?}", status);
                break reconcile(status, adaptive_kill);
            },
            Err(nix::Error::Sys(nix::errno::Errno::ECHILD)) => break ExitReason::KilledByOs,
            Err(e) => return Err(e).chain_err(|| "waitpid failed")
        }

        if let Some(snap) = metrics::read_process(pid.as_raw()) {
            peak_memory_kb = peak_memory_kb.max(snap.vm_peak_kb);
            page_faults_minor = snap.minor_faults;
            page_faults_major = snap.major_faults;
            read_syscalls = snap.read_syscalls;
            write_syscalls = snap.write_syscalls;

            let system = metrics::read_system();
            let cpu_percent = derive_cpu_percent(
                prev_process_ticks,
                prev_system_ticks,
                snap.cpu_ticks,
                system.total_ticks,
                cores
            );

            prev_process_ticks = Some(snap.cpu_ticks);
            prev_system_ticks = Some(system.total_ticks);
            peak_cpu = peak_cpu.max(cpu_percent);

            if timeline.len() < MAX_TIMELINE_SAMPLES {
                timeline.push(TimelineSample {
                    elapsed_ms: t0.elapsed().as_millis() as u64,
                    cpu_percent,
                    memory_kb: snap.vm_peak_kb
                });
            }

            trace!(
                "supervisor tick: cpu_percent={} vm_peak_kb={} minflt={} majflt={}",
                cpu_percent, snap.vm_peak_kb, snap.minor_faults, snap.major_faults
            );

            if profile.adaptive() && !adaptive_kill {
                let escalate = snap.cpu_ticks > cpu_tick_threshold
                    || page_faults_major > MAJOR_FAULT_THRESHOLD;
                if escalate {
                    println!(
                        "Adaptive policy escalation: killing pid {} (cpu_ticks={}, major_faults={})",
                        pid.as_raw(), snap.cpu_ticks, page_faults_major
                    );
                    warn!(
                        "adaptive policy escalation for pid {}: cpu_ticks={} major_faults={}",
                        pid.as_raw(), snap.cpu_ticks, page_faults_major
                    );
                    let _ = kill(pid, Signal::SIGKILL);
                    adaptive_kill = true;
                }
            }
        }

        thread::sleep(TICK_INTERVAL);
    };

    let runtime_ms = t0.elapsed().as_millis() as u64;

    let blocked_syscall = match exit_reason {
        ExitReason::SecurityViolation => "Unknown(SIGSYS)".to_string(),
        _ => String::new()
    };

    println!(
        "Child pid {} terminated: {} (runtime_ms={})",
        pid.as_raw(),
        exit_reason.as_label(),
        runtime_ms
    );
    info!(
        "child pid={} terminated: {} (runtime_ms={})",
        pid.as_raw(),
        exit_reason.as_label(),
        runtime_ms
    );

    Ok(TerminationRecord {
        pid: pid.as_raw(),
        program: program.to_string(),
        profile: profile.name().to_string(),
        timeline,
        runtime_ms,
        peak_cpu,
        peak_memory_kb,
        page_faults_minor,
        page_faults_major,
        read_syscalls,
        write_syscalls,
        exit_reason,
        blocked_syscall
    })
}

/// Delta-on-delta, multi-core-aware instantaneous CPU%. Zero on the first
/// sample (no prior deltas) or when the system-wide tick delta is zero.
fn derive_cpu_percent(
    prev_process_ticks: Option<u64>,
    prev_system_ticks: Option<u64>,
    process_ticks_now: u64,
    system_ticks_now: u64,
    cores: u64
) -> u64 {
    let (prev_p, prev_s) = match (prev_process_ticks, prev_system_ticks) {
        (Some(p), Some(s)) => (p, s),
        _ => return 0
    };

    let delta_process = process_ticks_now.saturating_sub(prev_p);
    let delta_system = system_ticks_now.saturating_sub(prev_s);
    if delta_system == 0 {
        return 0;
    }

    let raw = delta_process.saturating_mul(100).saturating_mul(cores) / delta_system;
    raw.min(100 * cores)
}

/// Turn a terminal `WaitStatus` into an `ExitReason`. `adaptive_kill` is
/// `true` if the supervisor already delivered a policy-driven kill before
/// this status was observed; in that case a `SIGKILL` status is reconciled
/// as `PolicyAdaptationKill`, which wins over `KilledByOs`.
fn reconcile(status: WaitStatus, adaptive_kill: bool) -> ExitReason {
    match status {
        WaitStatus::Exited(_, code) => ExitReason::Exited(code),
        WaitStatus::Signaled(_, Signal::SIGSYS, _) => ExitReason::SecurityViolation,
        WaitStatus::Signaled(_, Signal::SIGKILL, _) if adaptive_kill => {
            ExitReason::PolicyAdaptationKill
        },
        WaitStatus::Signaled(_, Signal::SIGKILL, _) => ExitReason::KilledByOs,
        WaitStatus::Signaled(_, sig, _) => ExitReason::Signaled(sig as i32),
        _ => ExitReason::KilledByOs
    }
}

#[cfg(test)]
mod tests {
    use super::derive_cpu_percent;

    #[test]
    fn test_first_sample_is_zero() {
        assert_eq!(derive_cpu_percent(None, None, 50, 1000, 4), 0);
    }

    #[test]
    fn test_zero_system_delta_is_zero() {
        assert_eq!(derive_cpu_percent(Some(10), Some(1000), 50, 1000, 4), 0);
    }

    #[test]
    fn test_fully_busy_single_core_reads_100_on_multicore_host() {
        // 10 process ticks out of 10 total system ticks on a 4-core host:
        // a fully busy single thread should read 100%, not 25%.
        assert_eq!(derive_cpu_percent(Some(0), Some(0), 10, 10, 4), 100);
    }

    #[test]
    fn test_hard_ceiling_at_100_times_cores() {
        assert_eq!(derive_cpu_percent(Some(0), Some(0), 1000, 10, 4), 400);
    }
}
