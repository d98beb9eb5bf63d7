//! Invocation diagnostics.
//!
//! [`InvocationDiagnostics`] records what happened inside one model
//! invocation: how many backend calls were made, which failure counters
//! moved, how often the credential rotated, and how long was spent waiting.

/// Records what happened during one model invocation.
///
/// Attached to every [`StructuredReply`](crate::reply::StructuredReply)
/// produced by [`ModelClient`](crate::client::ModelClient).
///
/// # Example
///
/// ```
/// use llm_relay::diagnostics::InvocationDiagnostics;
///
/// let diag = InvocationDiagnostics { attempts: 1, ..Default::default() };
/// assert!(diag.first_try());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationDiagnostics {
    /// Backend calls made, including the successful one.
    pub attempts: u32,

    /// Credential-class failures (auth, invalid key, quota).
    pub call_failures: u32,

    /// Rejected replies plus unexpected upstream errors. One shared counter.
    pub validation_failures: u32,

    /// How many times this invocation advanced the credential cursor.
    pub rotations: u32,

    /// Pool slot of the credential used by the last attempt.
    pub credential_index: usize,

    /// Total time spent in retry delays (milliseconds).
    pub backoff_total_ms: u64,

    /// Message of the most recent failure, if any attempt failed.
    pub last_error: Option<String>,
}

impl InvocationDiagnostics {
    /// Did the first backend call produce the reply?
    pub fn first_try(&self) -> bool {
        self.attempts == 1 && self.call_failures == 0 && self.validation_failures == 0
    }

    /// Total failed attempts across both counters.
    pub fn failures(&self) -> u32 {
        self.call_failures + self.validation_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_default() {
        let d = InvocationDiagnostics::default();
        assert_eq!(d.attempts, 0);
        assert_eq!(d.failures(), 0);
        assert!(d.last_error.is_none());
        assert!(!d.first_try());
    }

    #[test]
    fn test_failures_sum_both_counters() {
        let d = InvocationDiagnostics {
            attempts: 4,
            call_failures: 2,
            validation_failures: 1,
            ..Default::default()
        };
        assert_eq!(d.failures(), 3);
        assert!(!d.first_try());
    }
}
