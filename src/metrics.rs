//! Host Metrics Reader (C1).
//!
//! Three pure read operations over the host's process introspection surface.
//! Cumulative CPU ticks and fault counts are read through the `procinfo`
//! crate; `procinfo` 0.4 does not expose `VmPeak` or the `/proc/[pid]/io`
//! counters, so those two are parsed directly, tolerant of missing fields
//! and variable whitespace.

use std::fs;

/// One observation of a child process's cumulative counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessSnapshot {
    /// Cumulative CPU ticks, user + kernel, self + children.
    pub cpu_ticks: u64,

    /// Cumulative minor page faults, self + children.
    pub minor_faults: u64,

    /// Cumulative major page faults, self + children.
    pub major_faults: u64,

    /// Peak virtual memory size, in KiB.
    pub vm_peak_kb: u64,

    /// Cumulative count of read-family syscalls (`/proc/[pid]/io`'s `syscr`).
    pub read_syscalls: u64,

    /// Cumulative count of write-family syscalls (`/proc/[pid]/io`'s `syscw`).
    pub write_syscalls: u64
}

/// A system-wide CPU time observation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemSnapshot {
    /// Total CPU ticks summed across all system time fields (user, nice,
    /// system, idle, iowait, irq, softirq, steal) and all cores.
    pub total_ticks: u64
}

/// Read the cumulative counters for `pid`. Returns `None` ("Unavailable") if
/// the process's `/proc/[pid]/stat` record cannot be read (already reaped,
/// permission denied). Callers must not abort sampling on `None`; they
/// should simply hold their prior readings and continue.
pub fn read_process(pid: i32) -> Option<ProcessSnapshot> {
    let stat = procinfo::pid::stat(pid).ok()?;

    let cpu_ticks = (stat.utime as u64).wrapping_add(stat.stime as u64);
    let minor_faults = (stat.minflt as u64).wrapping_add(stat.cminflt as u64);
    let major_faults = (stat.majflt as u64).wrapping_add(stat.cmajflt as u64);

    Some(ProcessSnapshot {
        cpu_ticks,
        minor_faults,
        major_faults,
        vm_peak_kb: read_vm_peak_kb(pid).unwrap_or(0),
        read_syscalls: read_io_counters(pid).map(|(r, _)| r).unwrap_or(0),
        write_syscalls: read_io_counters(pid).map(|(_, w)| w).unwrap_or(0)
    })
}

/// Parse `/proc/[pid]/status` for the `VmPeak` field, in KiB.
fn read_vm_peak_kb(pid: i32) -> Option<u64> {
    let contents = fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VmPeak:") {
            return rest.trim().split_whitespace().next()?.parse().ok();
        }
    }

    None
}

/// Parse `/proc/[pid]/io` for the `syscr`/`syscw` counters. These count
/// I/O-family syscalls only, not the process's total syscall count.
fn read_io_counters(pid: i32) -> Option<(u64, u64)> {
    let contents = fs::read_to_string(format!("/proc/{}/io", pid)).ok()?;

    let mut read_syscalls = 0u64;
    let mut write_syscalls = 0u64;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("syscr:") {
            read_syscalls = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("syscw:") {
            write_syscalls = rest.trim().parse().unwrap_or(0);
        }
    }

    Some((read_syscalls, write_syscalls))
}

/// Read total system CPU ticks from `/proc/stat`'s `cpu` summary line. On any
/// parse failure, returns 0 (the derived CPU% for that interval then
/// collapses to 0).
pub fn read_system() -> SystemSnapshot {
    let total_ticks = fs::read_to_string("/proc/stat")
        .ok()
        .and_then(|contents| contents.lines().next().map(str::to_owned))
        .map(|line| parse_cpu_line(&line))
        .unwrap_or(0);

    SystemSnapshot { total_ticks }
}

/// Parse a `/proc/stat` `cpu ...` line: `cpu <user> <nice> <system> <idle>
/// <iowait> <irq> <softirq> <steal> ...`. Tolerant of a short field list (old
/// kernels may omit the trailing fields); requires at least `user`, `nice`,
/// `system`, `idle` to consider the line parseable.
fn parse_cpu_line(line: &str) -> u64 {
    let mut fields = line.split_whitespace();
    match fields.next() {
        Some("cpu") => (),
        _ => return 0
    };

    let values: Vec<u64> = fields.filter_map(|f| f.parse::<u64>().ok()).collect();
    if values.len() < 4 {
        return 0;
    }

    values.iter().sum()
}

/// Report the number of online logical CPUs. Falls back to 1 if the host
/// cannot answer.
pub fn core_count() -> u64 {
    let n = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if n <= 0 {
        1
    } else {
        n as u64
    }
}

/// Clock ticks per second, used to convert cumulative CPU ticks into seconds
/// (and for the adaptive policy's CPU-ticks threshold).
pub fn clock_tick_hz() -> u64 {
    const FALLBACK_CLK_TCK: i64 = 100;

    let n = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if n <= 0 {
        FALLBACK_CLK_TCK as u64
    } else {
        n as u64
    }
}

#[cfg(test)]
mod tests {
    use super::parse_cpu_line;

    #[test]
    fn test_parse_cpu_line_full() {
        let line = "cpu  10 20 30 40 5 6 7 8";
        assert_eq!(parse_cpu_line(line), 10 + 20 + 30 + 40 + 5 + 6 + 7 + 8);
    }

    #[test]
    fn test_parse_cpu_line_short() {
        // Old kernels may omit the trailing fields; still parseable as long
        // as the first four are present.
        let line = "cpu  10 20 30 40";
        assert_eq!(parse_cpu_line(line), 100);
    }

    #[test]
    fn test_parse_cpu_line_too_short_is_zero() {
        let line = "cpu  10 20";
        assert_eq!(parse_cpu_line(line), 0);
    }

    #[test]
    fn test_parse_cpu_line_malformed() {
        assert_eq!(parse_cpu_line("not the cpu line at all"), 0);
        assert_eq!(parse_cpu_line(""), 0);
    }

    #[test]
    fn test_read_process_of_nonexistent_pid_is_unavailable() {
        // PID 1 always exists on a real system but is very unlikely to be
        // accessible cross-container; use a PID that cannot exist instead.
        assert!(super::read_process(i32::MAX).is_none());
    }
}
