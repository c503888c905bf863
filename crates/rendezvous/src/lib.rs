//! Callback Rendezvous (C4) — reunites an async callback with the task
//! blocked waiting on it. Modeled on the same one-slot-channel-plus-timeout
//! shape as the teacher's exec approval workflow, generalized from a human
//! decision to an Executor's callback result.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use npg_domain::model::ExecuteResult;

/// The three terminal outcomes of [`Rendezvous::await_execution`].
#[derive(Debug)]
pub enum Outcome {
    Success(ExecuteResult),
    Timeout { request_id: String, timeout_ms: u64 },
    Error(String),
}

struct Slot {
    tx: oneshot::Sender<ExecuteResult>,
}

/// A concurrent mapping from `request_id` to a single-slot delivery slot.
///
/// Single-producer (the callback), single-consumer (the waiter) rendezvous
/// per key. `awaitExecution` is the only public entry point that combines
/// register + trigger + await, so callers can never invoke the trigger
/// before registering and race-lose a fast callback.
pub struct Rendezvous {
    slots: Mutex<HashMap<String, Slot>>,
}

impl Default for Rendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of requests currently awaiting a callback (for monitoring).
    pub fn pending_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn register(&self, request_id: &str) -> oneshot::Receiver<ExecuteResult> {
        let (tx, rx) = oneshot::channel();
        let prev = self.slots.lock().insert(request_id.to_string(), Slot { tx });
        debug_assert!(
            prev.is_none(),
            "rendezvous: registering over an existing pending request {request_id}"
        );
        rx
    }

    /// Deliver a result to the slot if present. Non-blocking. A callback for
    /// an unknown id (the waiter already timed out) is a no-op aside from a
    /// warning log — this is the defined behavior for the late-callback race.
    pub fn complete(&self, request_id: &str, result: ExecuteResult) {
        let slot = self.slots.lock().remove(request_id);
        match slot {
            Some(slot) => {
                // A dropped receiver (waiter already gone) is not an error here.
                let _ = slot.tx.send(result);
            }
            None => {
                tracing::warn!(
                    request_id,
                    "late callback for unknown or already-completed request, dropping"
                );
            }
        }
    }

    /// Register, invoke `trigger`, then block until the slot is filled or
    /// `timeout_ms` elapses. Registration happens-before the trigger call so
    /// a callback racing a slow trigger can never lose the result.
    ///
    /// If `trigger` returns `Err`, the slot is removed immediately and
    /// [`Outcome::Error`] is returned without waiting out the timeout.
    pub async fn await_execution<F, Fut>(
        &self,
        request_id: &str,
        timeout_ms: u64,
        trigger: F,
    ) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let rx = self.register(request_id);

        if let Err(e) = trigger().await {
            self.slots.lock().remove(request_id);
            return Outcome::Error(e);
        }

        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => Outcome::Success(result),
            Ok(Err(_)) => {
                // Sender dropped without sending — treat as an internal error,
                // not a timeout, since it did not run out the clock.
                self.slots.lock().remove(request_id);
                Outcome::Error(format!("rendezvous slot for {request_id} dropped without delivery"))
            }
            Err(_) => {
                self.slots.lock().remove(request_id);
                Outcome::Timeout {
                    request_id: request_id.to_string(),
                    timeout_ms,
                }
            }
        }
    }

    /// Remove a pending slot outright, e.g. on client-disconnect cancellation.
    pub fn cancel(&self, request_id: &str) {
        self.slots.lock().remove(request_id);
    }
}

/// Convenience constructor for a successful executor result, used by tests
/// and the gateway's callback handler alike.
pub fn success_result(request_id: impl Into<String>, output: Value) -> ExecuteResult {
    ExecuteResult {
        request_id: request_id.into(),
        success: true,
        output: Some(output),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npg_domain::model::ExecuteError;

    fn failed_result(id: &str, code: &str, message: &str) -> ExecuteResult {
        ExecuteResult {
            request_id: id.into(),
            success: false,
            output: None,
            error: Some(ExecuteError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    #[tokio::test]
    async fn concurrent_trigger_and_complete_delivers_result() {
        let rendezvous = std::sync::Arc::new(Rendezvous::new());
        let rv = rendezvous.clone();

        let outcome = rendezvous
            .await_execution("r2", 5_000, move || {
                let rv = rv.clone();
                async move {
                    tokio::spawn(async move {
                        rv.complete("r2", success_result("r2", serde_json::json!({"answer": "ok"})));
                    });
                    Ok(())
                }
            })
            .await;

        match outcome {
            Outcome::Success(result) => {
                assert!(result.success);
                assert_eq!(result.output.unwrap()["answer"], "ok");
            }
            other => panic!("expected Success, got {other:?}"),
        }
        assert_eq!(rendezvous.pending_count(), 0);
    }

    #[tokio::test]
    async fn failure_result_is_delivered_as_success_outcome_with_success_false() {
        let rendezvous = std::sync::Arc::new(Rendezvous::new());
        let rv = rendezvous.clone();

        let outcome = rendezvous
            .await_execution("r3", 5_000, move || {
                let rv = rv.clone();
                async move {
                    tokio::spawn(async move {
                        rv.complete("r3", failed_result("r3", "EXECUTION_FAILED", "boom"));
                    });
                    Ok(())
                }
            })
            .await;

        match outcome {
            Outcome::Success(result) => {
                assert!(!result.success);
                assert_eq!(result.error.unwrap().code, "EXECUTION_FAILED");
            }
            other => panic!("expected Success(success=false), got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_removes_slot_and_late_complete_is_a_noop() {
        let rendezvous = std::sync::Arc::new(Rendezvous::new());

        let outcome = rendezvous.await_execution("r4", 50, || async { Ok(()) }).await;
        assert!(matches!(outcome, Outcome::Timeout { timeout_ms: 50, .. }));
        assert_eq!(rendezvous.pending_count(), 0);

        // Late callback after timeout must not panic and must be a no-op.
        rendezvous.complete("r4", success_result("r4", serde_json::json!({})));
        assert_eq!(rendezvous.pending_count(), 0);
    }

    #[tokio::test]
    async fn trigger_failure_short_circuits_without_waiting_for_timeout() {
        let rendezvous = Rendezvous::new();
        let outcome = rendezvous
            .await_execution("r5", 60_000, || async { Err("publish failed".to_string()) })
            .await;
        assert!(matches!(outcome, Outcome::Error(msg) if msg == "publish failed"));
        assert_eq!(rendezvous.pending_count(), 0);
    }

    #[test]
    fn complete_on_unknown_id_is_a_noop() {
        let rendezvous = Rendezvous::new();
        rendezvous.complete("ghost", success_result("ghost", serde_json::json!({})));
        assert_eq!(rendezvous.pending_count(), 0);
    }
}
