//! Report Emitter (C5).
//!
//! Serializes a termination record to a single JSON document under
//! `logs/`, named so concurrent runs never collide.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::errors::*;
use crate::record::TerminationRecord;

const LOGS_DIR: &str = "logs";

#[derive(Serialize)]
struct Timeline {
    time_ms: Vec<u64>,
    cpu_percent: Vec<u64>,
    memory_kb: Vec<u64>
}

#[derive(Serialize)]
struct Summary {
    runtime_ms: u64,
    peak_cpu: u64,
    peak_memory_kb: u64,
    page_faults_minor: u64,
    page_faults_major: u64,
    read_syscalls: u64,
    write_syscalls: u64,
    blocked_syscalls: u32,
    termination: String,
    blocked_syscall: String,
    exit_reason: String
}

#[derive(Serialize)]
struct Document {
    pid: i32,
    program: String,
    profile: String,
    timeline: Timeline,
    summary: Summary
}

/// Serialize `record` to `logs/run_<pid>_<unix_seconds>.json`, creating the
/// `logs/` directory (mode 0755) if this is the first run. Returns the path
/// written.
pub fn emit(record: &TerminationRecord) -> Result<PathBuf> {
    ensure_logs_dir()?;

    let unix_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let path = PathBuf::from(LOGS_DIR).join(format!("run_{}_{}.json", record.pid, unix_seconds));

    let document = Document {
        pid: record.pid,
        program: record.program.clone(),
        profile: record.profile.clone(),
        timeline: Timeline {
            time_ms: record.timeline.iter().map(|s| s.elapsed_ms).collect(),
            cpu_percent: record.timeline.iter().map(|s| s.cpu_percent).collect(),
            memory_kb: record.timeline.iter().map(|s| s.memory_kb).collect()
        },
        summary: Summary {
            runtime_ms: record.runtime_ms,
            peak_cpu: record.peak_cpu,
            peak_memory_kb: record.peak_memory_kb,
            page_faults_minor: record.page_faults_minor,
            page_faults_major: record.page_faults_major,
            read_syscalls: record.read_syscalls,
            write_syscalls: record.write_syscalls,
            blocked_syscalls: record.exit_reason.blocked_syscalls(),
            termination: record.exit_reason.termination_label(),
            blocked_syscall: record.blocked_syscall.clone(),
            exit_reason: record.exit_reason.as_label()
        }
    };

    let json = serde_json::to_string_pretty(&document)
        .chain_err(|| ErrorKind::ReportEmitFailed(path.display().to_string()))?;

    fs::write(&path, json).chain_err(|| ErrorKind::ReportEmitFailed(path.display().to_string()))?;

    Ok(path)
}

fn ensure_logs_dir() -> Result<()> {
    if PathBuf::from(LOGS_DIR).is_dir() {
        return Ok(());
    }

    fs::create_dir(LOGS_DIR)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o755);
        fs::set_permissions(LOGS_DIR, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ExitReason, TimelineSample};

    fn sample_record() -> TerminationRecord {
        TerminationRecord {
            pid: 4242,
            program: "/bin/true".to_string(),
            profile: "STRICT".to_string(),
            timeline: vec![TimelineSample { elapsed_ms: 100, cpu_percent: 12, memory_kb: 1024 }],
            runtime_ms: 100,
            peak_cpu: 12,
            peak_memory_kb: 1024,
            page_faults_minor: 3,
            page_faults_major: 0,
            read_syscalls: 5,
            write_syscalls: 1,
            exit_reason: ExitReason::Exited(0),
            blocked_syscall: String::new()
        }
    }

    #[test]
    fn test_document_serializes_expected_shape() {
        let record = sample_record();
        let document = Document {
            pid: record.pid,
            program: record.program.clone(),
            profile: record.profile.clone(),
            timeline: Timeline {
                time_ms: record.timeline.iter().map(|s| s.elapsed_ms).collect(),
                cpu_percent: record.timeline.iter().map(|s| s.cpu_percent).collect(),
                memory_kb: record.timeline.iter().map(|s| s.memory_kb).collect()
            },
            summary: Summary {
                runtime_ms: record.runtime_ms,
                peak_cpu: record.peak_cpu,
                peak_memory_kb: record.peak_memory_kb,
                page_faults_minor: record.page_faults_minor,
                page_faults_major: record.page_faults_major,
                read_syscalls: record.read_syscalls,
                write_syscalls: record.write_syscalls,
                blocked_syscalls: record.exit_reason.blocked_syscalls(),
                termination: record.exit_reason.termination_label(),
                blocked_syscall: record.blocked_syscall.clone(),
                exit_reason: record.exit_reason.as_label()
            }
        };

        let json = serde_json::to_value(&document).expect("document must serialize");
        assert_eq!(json["pid"], 4242);
        assert_eq!(json["summary"]["exit_reason"], "EXITED(0)");
        assert_eq!(json["timeline"]["time_ms"][0], 100);
    }
}
