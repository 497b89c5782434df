//! Operation timing and duration formatting
//!
//! Every instrumented operation is measured with a monotonic stopwatch and
//! summarized as an [`OperationOutcome`]: a status constrained to
//! ok/error, a joined error description, and a strictly positive elapsed
//! duration. The duration travels on events as a `H:MM:SS.nnnnnnnnn`
//! string; [`parse_duration`] reverses [`format_duration`] so tests can
//! assert on the parsed value.

use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::time::{Duration, Instant};

use qulab_core::domain::DomainError;

/// Monotonic stopwatch around an instrumented operation
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Starts measuring now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed time since start, clamped to a 1ns minimum so an emitted
    /// duration is always strictly positive.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed().max(Duration::from_nanos(1))
    }
}

/// Outcome status of an instrumented operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Ok,
    Error,
}

impl OperationStatus {
    /// The wire form used by the `Status` property.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Ok => "ok",
            OperationStatus::Error => "error",
        }
    }
}

impl Display for OperationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status, error description, and duration of a measured operation
///
/// Built once the operation completes; the same triad is attached to
/// every duration-wrapped event regardless of kind.
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub status: OperationStatus,
    /// Joined description of the failure(s); empty on success.
    pub errors: String,
    pub duration: Duration,
}

impl OperationOutcome {
    /// Derives an outcome from an operation result and its elapsed time.
    pub fn from_result<T, E: Display>(result: &Result<T, E>, duration: Duration) -> Self {
        match result {
            Ok(_) => Self {
                status: OperationStatus::Ok,
                errors: String::new(),
                duration,
            },
            Err(e) => Self {
                status: OperationStatus::Error,
                errors: e.to_string(),
                duration,
            },
        }
    }

    /// Whether the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == OperationStatus::Ok
    }
}

/// Runs an operation under a stopwatch.
///
/// Returns the operation's own result untouched, paired with the derived
/// outcome.
pub fn run_timed<T, E, F>(op: F) -> (Result<T, E>, OperationOutcome)
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    let watch = Stopwatch::start();
    let result = op();
    let outcome = OperationOutcome::from_result(&result, watch.elapsed());
    (result, outcome)
}

/// Awaits a future under a stopwatch.
///
/// The async twin of [`run_timed`].
pub async fn run_timed_async<T, E, Fut>(fut: Fut) -> (Result<T, E>, OperationOutcome)
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let watch = Stopwatch::start();
    let result = fut.await;
    let outcome = OperationOutcome::from_result(&result, watch.elapsed());
    (result, outcome)
}

/// Formats a duration as `H:MM:SS.nnnnnnnnn`.
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!(
        "{hours}:{minutes:02}:{seconds:02}.{:09}",
        d.subsec_nanos()
    )
}

/// Parses a duration previously produced by [`format_duration`].
///
/// Accepts shorter fractional parts (`0:00:01.5` reads as 1.5s).
///
/// # Errors
///
/// Returns [`DomainError::InvalidDuration`] on any malformed input.
pub fn parse_duration(s: &str) -> Result<Duration, DomainError> {
    let invalid = || DomainError::InvalidDuration(s.to_string());

    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(invalid());
    }

    let hours: u64 = parts[0].parse().map_err(|_| invalid())?;
    let minutes: u64 = parts[1].parse().map_err(|_| invalid())?;
    let (sec_part, frac_part) = parts[2].split_once('.').unwrap_or((parts[2], "0"));
    let seconds: u64 = sec_part.parse().map_err(|_| invalid())?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    // Normalize the fraction to exactly nine digits of nanoseconds.
    let mut nanos_str = frac_part.to_string();
    if nanos_str.len() > 9 {
        nanos_str.truncate(9);
    }
    while nanos_str.len() < 9 {
        nanos_str.push('0');
    }
    let nanos: u32 = nanos_str.parse().map_err(|_| invalid())?;

    Ok(Duration::new(hours * 3600 + minutes * 60 + seconds, nanos))
}
