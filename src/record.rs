//! The Termination Record: the run's final artifact, handed by value from
//! the supervisor (C4) to the report emitter (C5).

/// One point-in-time sample appended to the run's timeline.
#[derive(Clone, Copy, Debug)]
pub struct TimelineSample {
    pub elapsed_ms: u64,
    pub cpu_percent: u64,
    pub memory_kb: u64
}

/// Hard ceiling on the number of timeline samples retained: 1000 samples at
/// the 100ms cadence covers a 100s run. Beyond the cap, sampling continues
/// but new samples are dropped; the summary's peak/cumulative fields stay
/// correct regardless, since they are updated independently of append
/// success.
pub const MAX_TIMELINE_SAMPLES: usize = 1000;

/// Exactly one of these holds for any terminated run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExitReason {
    /// Normal exit with the given status code.
    Exited(i32),

    /// The child was signaled with the sandbox-violation signal (`SIGSYS`).
    /// The identity of the blocked syscall is not recoverable in this
    /// enforcement mode.
    SecurityViolation,

    /// The child was signaled with the uncatchable kill signal, and the
    /// supervisor had not already recorded a policy-driven kill.
    KilledByOs,

    /// The adaptive policy engine (`LEARNING` only) escalated and killed the
    /// child before it exited on its own.
    PolicyAdaptationKill,

    /// The child was signaled with some other signal.
    Signaled(i32)
}

impl ExitReason {
    /// The document's `summary.exit_reason` string. Note the misspelling in
    /// the `PolicyAdaptationKill` literal: existing consumers depend on the
    /// exact spelling `POLICY_ADAPATION_KILL`, so it is kept unconditionally
    /// rather than fixed.
    pub fn as_label(&self) -> String {
        match self {
            ExitReason::Exited(code) => format!("EXITED({})", code),
            ExitReason::SecurityViolation => "SECURITY_VIOLATION".to_string(),
            ExitReason::KilledByOs => "KILLED_BY_OS".to_string(),
            ExitReason::PolicyAdaptationKill => "POLICY_ADAPATION_KILL".to_string(),
            // The signal number itself is reported separately, in
            // `termination_label`.
            ExitReason::Signaled(_) => "SIGNALED".to_string()
        }
    }

    /// The `summary.termination` field: `"SIG<n>"` if the child was
    /// terminated by a non-kill, non-SIGSYS signal, else the empty string.
    pub fn termination_label(&self) -> String {
        match self {
            ExitReason::Signaled(n) => format!("SIG{}", n),
            _ => String::new()
        }
    }

    /// Whether this reason implies exactly one blocked syscall: a security
    /// violation always blocks exactly one, every other reason blocks none.
    pub fn blocked_syscalls(&self) -> u32 {
        match self {
            ExitReason::SecurityViolation => 1,
            _ => 0
        }
    }
}

/// The run's final artifact. Assembled once at reap time and passed by value
/// to the emitter; never aliased.
#[derive(Clone, Debug)]
pub struct TerminationRecord {
    pub pid: i32,
    pub program: String,
    pub profile: String,

    pub timeline: Vec<TimelineSample>,

    pub runtime_ms: u64,
    pub peak_cpu: u64,
    pub peak_memory_kb: u64,
    pub page_faults_minor: u64,
    pub page_faults_major: u64,
    pub read_syscalls: u64,
    pub write_syscalls: u64,

    pub exit_reason: ExitReason,
    pub blocked_syscall: String
}

#[cfg(test)]
mod tests {
    use super::ExitReason;

    #[test]
    fn test_exited_label() {
        assert_eq!(ExitReason::Exited(0).as_label(), "EXITED(0)");
        assert_eq!(ExitReason::Exited(7).as_label(), "EXITED(7)");
    }

    #[test]
    fn test_misspelled_policy_adaptation_kill_literal_is_preserved() {
        assert_eq!(ExitReason::PolicyAdaptationKill.as_label(), "POLICY_ADAPATION_KILL");
    }

    #[test]
    fn test_signaled_label_and_termination() {
        let reason = ExitReason::Signaled(11);
        assert_eq!(reason.as_label(), "SIGNALED");
        assert_eq!(reason.termination_label(), "SIG11");
    }

    #[test]
    fn test_blocked_syscalls_invariant() {
        assert_eq!(ExitReason::SecurityViolation.blocked_syscalls(), 1);
        assert_eq!(ExitReason::Exited(0).blocked_syscalls(), 0);
        assert_eq!(ExitReason::KilledByOs.blocked_syscalls(), 0);
        assert_eq!(ExitReason::PolicyAdaptationKill.blocked_syscalls(), 0);
    }
}
