//! Deadline-bounded polling shared by the browser waits and the download
//! directory checks.

use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Why a bounded wait ended without producing a value.
#[derive(Debug)]
pub enum WaitError<E> {
    /// The condition never held before the deadline.
    TimedOut(Duration),
    /// The probe itself failed; polling stops immediately.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for WaitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitError::TimedOut(waited) => write!(f, "condition not met within {waited:?}"),
            WaitError::Failed(err) => write!(f, "probe failed: {err}"),
        }
    }
}

/// Calls `probe` every `interval` until it yields a value or `timeout` has
/// elapsed. `Ok(None)` means "not yet". The probe always runs at least once,
/// and once more right at the deadline.
pub fn await_condition<T, E, F>(
    interval: Duration,
    timeout: Duration,
    mut probe: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let started = Instant::now();
    let deadline = started + timeout;

    loop {
        if let Some(value) = probe().map_err(WaitError::Failed)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(WaitError::TimedOut(now - started));
        }
        thread::sleep(interval.min(deadline - now));
    }
}

/// Waits until the size of `path` reads the same on two consecutive checks.
/// Returns the settled size.
pub fn await_stable_size(
    path: &Path,
    interval: Duration,
    timeout: Duration,
) -> Result<u64, WaitError<std::io::Error>> {
    let mut previous: Option<u64> = None;
    await_condition(interval, timeout, || -> std::io::Result<Option<u64>> {
        let size = fs::metadata(path)?.len();
        debug!(path = %path.display(), size, "checked artifact size");
        if previous == Some(size) {
            return Ok(Some(size));
        }
        previous = Some(size);
        Ok(None)
    })
}
