use std::fmt;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a call stopped before finishing on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The caller cancelled the call
    Cancelled,
    /// The call's deadline passed
    DeadlineExceeded,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("request cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Per-call state threaded through a single provider call
///
/// Cloning is cheap and clones share the same cancellation signal, so a
/// stream task can hold its own copy while the caller keeps the ability to
/// cancel.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
    structured_output_tool: Option<String>,
}

impl CallContext {
    /// Context with no deadline and a fresh cancellation token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Expire the call after `timeout` from now
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Expire the call at `deadline`
    ///
    /// An existing earlier deadline wins.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(self.deadline.map_or(deadline, |current| current.min(deadline)));
        self
    }

    /// Register the synthetic tool whose calls carry structured output
    #[must_use]
    pub fn with_structured_output_tool(mut self, name: impl Into<String>) -> Self {
        self.structured_output_tool = Some(name.into());
        self
    }

    /// Cancellation token shared by every clone of this context
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Deadline, if one was set
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Name of the registered structured-output tool
    pub fn structured_output_tool(&self) -> Option<&str> {
        self.structured_output_tool.as_deref()
    }

    /// Cancel the call and every clone of this context
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Non-blocking check, cancellation before deadline
    pub fn check(&self) -> Option<Interrupt> {
        if self.cancellation.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the call is cancelled or its deadline passes
    pub async fn interrupted(&self) -> Interrupt {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                () = self.cancellation.cancelled() => Interrupt::Cancelled,
                () = tokio::time::sleep_until(deadline) => Interrupt::DeadlineExceeded,
            },
            None => {
                self.cancellation.cancelled().await;
                Interrupt::Cancelled
            }
        }
    }
}
