use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::AlexaError;
use crate::models::{ATTRIBUTION_STYLE, ConversationFragment, HistoryRecord};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const HISTORY_SAFETY_BUFFER_MS: i64 = 1_000;
pub const HISTORY_LOOKAHEAD_MS: i64 = 60_000;
pub const QUESTION_PREFIX_CHARS: usize = 20;

pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> Instant;
    fn unix_millis(&self) -> i64;
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            timeout,
        }
    }
}

/// Errors for which [`AlexaError::is_transient`] holds are logged and retried; any other
/// error ends the loop. The last sleep is clipped to the remaining time, so the loop never
/// runs past the deadline by more than one attempt.
pub async fn poll_until<C, T, F>(
    clock: &C,
    policy: PollPolicy,
    waiting_for: &'static str,
    mut attempt: F,
) -> Result<T, AlexaError>
where
    C: Clock,
    F: AsyncFnMut() -> Result<Option<T>, AlexaError>,
{
    let deadline = clock.now() + policy.timeout;
    let mut attempts = 0_u32;

    loop {
        let remaining = deadline.saturating_duration_since(clock.now());
        if remaining.is_zero() {
            return Err(AlexaError::Timeout {
                waiting_for,
                attempts,
            });
        }

        clock.sleep(policy.interval.min(remaining)).await;
        attempts += 1;

        match attempt().await {
            Ok(Some(value)) => {
                debug!(waiting_for, poll = attempts, "poll matched");
                return Ok(value);
            }
            Ok(None) => debug!(waiting_for, poll = attempts, "no match yet"),
            Err(err) if err.is_transient() => {
                warn!(waiting_for, poll = attempts, error = %err, "poll attempt failed; retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

pub fn question_prefix(question: &str) -> String {
    question
        .chars()
        .take(QUESTION_PREFIX_CHARS)
        .collect::<String>()
        .to_lowercase()
}

pub fn history_window(lower_bound_ms: i64, now_ms: i64) -> (i64, i64) {
    (lower_bound_ms, now_ms + HISTORY_LOOKAHEAD_MS)
}

/// Matching is heuristic: a record qualifies when its key names the device serial, it is
/// not older than `lower_bound_ms`, and its transcript contains the question prefix.
pub fn match_history_answer<'a>(
    records: &'a [HistoryRecord],
    device_serial: &str,
    lower_bound_ms: i64,
    question: &str,
) -> Option<&'a str> {
    let prefix = question_prefix(question);
    records
        .iter()
        .filter(|record| record.record_key.contains(device_serial))
        .filter(|record| record.timestamp >= lower_bound_ms)
        .filter(|record| {
            !record.customer_utterance.is_empty()
                && record.customer_utterance.to_lowercase().contains(&prefix)
        })
        .map(|record| record.alexa_response.as_str())
        .find(|reply| !reply.is_empty())
}

pub fn match_agent_reply(fragments: &[ConversationFragment]) -> Option<String> {
    let fragment = fragments
        .iter()
        .find(|fragment| fragment.is_agent_turn() && !fragment.text().is_empty())?;

    let mut reply = fragment.text().to_string();
    if let Some(content) = &fragment.content {
        for item in content.items() {
            if item.style == ATTRIBUTION_STYLE {
                reply.push('\n');
                reply.push_str(&item.text);
            }
        }
    }
    Some(reply)
}
