//! Event hooks for model invocation lifecycle.
//!
//! Provides an optional, non-intrusive way to observe what the
//! [`ModelClient`](crate::client::ModelClient) does inside one invocation:
//! each attempt, every rejected reply or upstream error, credential
//! rotations, and the final result. Implement [`EventHandler`] to feed
//! these into metrics, audit logs, or tests.

use std::sync::Arc;

/// Events emitted during a model invocation.
#[derive(Debug, Clone)]
pub enum Event {
    /// A backend call is about to be made.
    AttemptStart {
        /// Attempt number within this invocation (1-indexed).
        attempt: u32,
        /// Pool slot of the credential used for this attempt.
        credential_index: usize,
    },
    /// The provider rejected the credential or its quota.
    CredentialRejected {
        attempt: u32,
        credential_index: usize,
        /// HTTP status returned by the provider.
        status: u16,
    },
    /// The cursor moved to another credential.
    CredentialRotated {
        from: usize,
        to: usize,
    },
    /// The reply arrived but held no usable JSON block, or violated the contract.
    ReplyRejected {
        attempt: u32,
        reason: String,
    },
    /// Transport failure, timeout, or a non-credential error status.
    UpstreamError {
        attempt: u32,
        reason: String,
    },
    /// Waiting before the next attempt.
    RetryScheduled {
        /// The attempt about to be retried (1-indexed).
        attempt: u32,
        /// Delay before the next attempt in milliseconds.
        delay_ms: u64,
    },
    /// The invocation reached a terminal state.
    Finished {
        /// Total backend calls made.
        attempts: u32,
        /// Whether a contract-conforming reply was produced.
        ok: bool,
    },
}

/// Handler for invocation lifecycle events.
///
/// This is entirely optional: the client works without an event handler.
///
/// # Example
///
/// ```
/// use llm_relay::events::{Event, EventHandler};
///
/// struct RotationLogger;
///
/// impl EventHandler for RotationLogger {
///     fn on_event(&self, event: Event) {
///         if let Event::CredentialRotated { from, to } = event {
///             println!("credential {} -> {}", from, to);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called synchronously from the invoking task.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use llm_relay::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::Finished { attempts, ok } = event {
///         println!("done after {} attempts (ok={})", attempts, ok);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(&None, Event::Finished { attempts: 1, ok: true });
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |event: Event| {
            if matches!(event, Event::CredentialRotated { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));
        let handler = Some(handler);
        emit(&handler, Event::CredentialRotated { from: 0, to: 1 });
        emit(&handler, Event::AttemptStart { attempt: 2, credential_index: 1 });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
