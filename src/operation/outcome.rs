//! Execution outcomes and the per-call execution context.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::coverage::CoverageProbe;
use crate::reflect::{Thrown, Value};

#[derive(Debug, Clone, PartialEq)]
/// Result of executing an operation.
pub enum ExecutionOutcome {
    /// The call returned a value (`Value::Null` for `void`).
    NormalReturn { value: Value, elapsed: Duration },
    /// The call threw.
    ExceptionalReturn { exception: Thrown, elapsed: Duration },
    /// The deadline passed while the call was running.
    Timeout { elapsed: Duration },
    /// The call was never started.
    NotExecuted,
}

impl ExecutionOutcome {
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::NormalReturn { .. })
    }

    pub fn is_exceptional(&self) -> bool {
        matches!(self, Self::ExceptionalReturn { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_not_executed(&self) -> bool {
        matches!(self, Self::NotExecuted)
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::NormalReturn { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<&Thrown> {
        match self {
            Self::ExceptionalReturn { exception, .. } => Some(exception),
            _ => None,
        }
    }

    /// Time spent inside the invocation; zero when nothing ran.
    pub fn elapsed(&self) -> Duration {
        match self {
            Self::NormalReturn { elapsed, .. }
            | Self::ExceptionalReturn { elapsed, .. }
            | Self::Timeout { elapsed } => *elapsed,
            Self::NotExecuted => Duration::ZERO,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NormalReturn { value, elapsed } => {
                write!(f, "normal return {value} ({}us)", elapsed.as_micros())
            }
            Self::ExceptionalReturn { exception, elapsed } => {
                write!(f, "exception {exception} ({}us)", elapsed.as_micros())
            }
            Self::Timeout { elapsed } => write!(f, "timeout ({}us)", elapsed.as_micros()),
            Self::NotExecuted => f.write_str("not executed"),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Cooperative cancellation shared between a caller and a running call.
///
/// Clones share the cancellation flag. A token with no deadline expires only
/// when cancelled.
pub struct DeadlineToken {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl DeadlineToken {
    /// Token that never expires unless cancelled.
    pub fn never() -> Self {
        Self::default()
    }

    /// Token expiring `timeout` from now. A timeout past the clock's range
    /// never expires.
    pub fn after(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::at(deadline),
            None => Self::never(),
        }
    }

    pub fn at(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_expired(&self) -> bool {
        self.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Shared writer receiving one line per executed operation.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

#[derive(Clone, Default)]
/// Per-call execution settings.
pub struct ExecutionContext {
    deadline: DeadlineToken,
    probe: Option<Arc<dyn CoverageProbe>>,
    output: Option<OutputSink>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: DeadlineToken) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn CoverageProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_output(mut self, output: OutputSink) -> Self {
        self.output = Some(output);
        self
    }

    pub fn deadline(&self) -> &DeadlineToken {
        &self.deadline
    }

    pub fn probe(&self) -> Option<&Arc<dyn CoverageProbe>> {
        self.probe.as_ref()
    }

    pub(crate) fn record(&self, operation: &str, outcome: &ExecutionOutcome) {
        if let Some(output) = &self.output {
            // Sink write failures are ignored.
            let _ = writeln!(output.lock(), "{operation} => {outcome}");
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("deadline", &self.deadline)
            .field("probe", &self.probe.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_token_is_expired_in_every_clone() {
        let token = DeadlineToken::never();
        let clone = token.clone();
        assert!(!clone.is_expired());
        token.cancel();
        assert!(clone.is_expired());
    }

    #[test]
    fn past_deadline_is_expired() {
        assert!(DeadlineToken::after(Duration::ZERO).is_expired());
        assert!(!DeadlineToken::after(Duration::from_secs(3600)).is_expired());
    }

    #[test]
    fn unrepresentable_timeout_never_expires() {
        let token = DeadlineToken::after(Duration::MAX);
        assert!(!token.is_expired());
        token.cancel();
        assert!(token.is_expired());
    }

    #[test]
    fn outcome_accessors() {
        let outcome = ExecutionOutcome::NormalReturn {
            value: Value::Int(1),
            elapsed: Duration::from_micros(5),
        };
        assert!(outcome.is_normal());
        assert_eq!(outcome.value(), Some(&Value::Int(1)));
        assert_eq!(outcome.elapsed(), Duration::from_micros(5));
        assert_eq!(ExecutionOutcome::NotExecuted.elapsed(), Duration::ZERO);
    }

    #[test]
    fn output_sink_receives_one_line_per_record() {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let ctx = ExecutionContext::new().with_output(buffer.clone());
        ctx.record("literal : int . 1 () -> int", &ExecutionOutcome::NotExecuted);
        let text = String::from_utf8(buffer.lock().clone()).unwrap();
        assert_eq!(text, "literal : int . 1 () -> int => not executed\n");
    }
}
