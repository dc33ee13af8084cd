//! Action executor registry.
//!
//! Maps an approval request's action kind to the side-effecting operation
//! performed once the request is approved. Handler failures — including
//! panics — are converted to structured failures so execution can never
//! corrupt the request's terminal state.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde_json::Value as JsonValue;
use tracing::error;

use helmcrm_approvals::ApprovalAction;

/// Handler for one action kind.
///
/// The state machine guarantees at most one invocation per approved request;
/// handlers need not be idempotent across independent requests.
pub type ActionHandler = Box<dyn Fn(&ApprovalAction) -> anyhow::Result<JsonValue> + Send + Sync>;

/// Structured execution failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("no handler registered for action '{0}'")]
    UnknownAction(String),

    #[error("{0}")]
    HandlerFailed(String),

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),
}

/// Registry of action handlers.
#[derive(Default)]
pub struct ExecutorRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an action kind (`ApprovalAction::kind`).
    pub fn register<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&ApprovalAction) -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Invoke the handler for the action's kind.
    pub fn execute(&self, action: &ApprovalAction) -> Result<JsonValue, ExecutionError> {
        let handler = self
            .handlers
            .get(action.kind())
            .ok_or_else(|| ExecutionError::UnknownAction(action.kind().to_string()))?;

        match catch_unwind(AssertUnwindSafe(|| handler(action))) {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => Err(ExecutionError::HandlerFailed(format!("{e:#}"))),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(kind = action.kind(), panic = %message, "action handler panicked");
                Err(ExecutionError::HandlerPanicked(message))
            }
        }
    }
}

impl core::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
