use std::time::Duration;

use tracing::warn;

use crate::error::GdmError;
use crate::galaxy::{DatasetState, DatasetStatus};

/// Budget for transient connection failures while polling. The backoff grows
/// linearly with the number of failures seen so far.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            backoff: Duration::from_secs(30),
        }
    }
}

/// Poll quickly once so short jobs return fast, then settle on a longer
/// fixed period.
#[derive(Debug, Clone)]
pub struct PollIntervals {
    pub first: Duration,
    pub steady: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            first: Duration::from_secs(10),
            steady: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaitConfig {
    pub intervals: PollIntervals,
    pub retry: RetryPolicy,
}

impl WaitConfig {
    /// All-zero durations, for tests.
    pub fn immediate() -> Self {
        Self {
            intervals: PollIntervals {
                first: Duration::ZERO,
                steady: Duration::ZERO,
            },
            retry: RetryPolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        }
    }
}

/// Poll `fetch` until the reported state is terminal (`ok` or `error`).
///
/// Connection errors count against the retry budget and never reset; any
/// other error aborts immediately. An already-terminal dataset returns on
/// the first poll without sleeping.
pub fn await_terminal<F>(mut fetch: F, config: &WaitConfig) -> Result<DatasetState, GdmError>
where
    F: FnMut() -> Result<DatasetStatus, GdmError>,
{
    let mut error_count: u32 = 0;
    let mut interval = config.intervals.first;

    loop {
        match fetch() {
            Ok(status) if status.state.is_terminal() => return Ok(status.state),
            Ok(_) => {}
            Err(GdmError::Connection(message)) => {
                error_count += 1;
                if error_count > config.retry.max_attempts {
                    return Err(GdmError::ConnectionExhausted);
                }
                let delay = config.retry.backoff * error_count;
                warn!(
                    "could not connect to the Galaxy server ({message}), \
                     waiting {delay:?} before retrying"
                );
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }

        std::thread::sleep(interval);
        interval = config.intervals.steady;
    }
}
