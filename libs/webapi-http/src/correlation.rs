//! Per-call response correlation.
//!
//! Every in-flight call owns a [`CallContext`]: its correlation id, the
//! parsing options for its response, and the two continuations. The context
//! is consumed by [`CallContext::resolve`], so exactly one continuation runs,
//! exactly once, and nothing outlives the call.

use std::fmt;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::CallError;
use crate::response::WebApiResponse;

/// Identifier of an in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub type SuccessFn = Box<dyn FnOnce(WebApiResponse) + Send + Sync>;
pub type ErrorFn = Box<dyn FnOnce(CallError) + Send + Sync>;

/// Why a call context was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Success,
    ErrorStatus,
    MultiError,
    Transport,
    Rejected,
}

impl Release {
    #[must_use]
    pub fn of(outcome: &Result<WebApiResponse, CallError>) -> Self {
        match outcome {
            Ok(_) => Self::Success,
            Err(CallError::Status(_)) => Self::ErrorStatus,
            Err(CallError::MultiStatus { .. }) => Self::MultiError,
            Err(CallError::Transport(_)) => Self::Transport,
            Err(_) => Self::Rejected,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ErrorStatus => "error_status",
            Self::MultiError => "multi_error",
            Self::Transport => "transport",
            Self::Rejected => "rejected",
        }
    }
}

enum Continuation {
    Callbacks {
        on_success: SuccessFn,
        on_error: ErrorFn,
    },
    Channel(oneshot::Sender<Result<WebApiResponse, CallError>>),
}

/// Parsing context and continuations of one call.
pub struct CallContext<O> {
    id: CorrelationId,
    options: O,
    continuation: Continuation,
}

impl<O> CallContext<O> {
    /// Context with a fresh correlation id.
    pub fn new<S, E>(options: O, on_success: S, on_error: E) -> Self
    where
        S: FnOnce(WebApiResponse) + Send + Sync + 'static,
        E: FnOnce(CallError) + Send + Sync + 'static,
    {
        Self {
            id: CorrelationId::new(),
            options,
            continuation: Continuation::Callbacks {
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            },
        }
    }

    /// Context whose outcome is delivered through a oneshot channel instead
    /// of callbacks.
    pub fn channel(options: O) -> (Self, oneshot::Receiver<Result<WebApiResponse, CallError>>) {
        let (tx, rx) = oneshot::channel();
        let ctx = Self {
            id: CorrelationId::new(),
            options,
            continuation: Continuation::Channel(tx),
        };
        (ctx, rx)
    }

    #[must_use]
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    #[must_use]
    pub fn options(&self) -> &O {
        &self.options
    }

    /// Run the continuation matching `outcome` and drop the context.
    pub fn resolve(self, outcome: Result<WebApiResponse, CallError>) {
        let reason = Release::of(&outcome);
        tracing::debug!(call_id = %self.id, reason = reason.as_str(), "releasing call context");
        match (self.continuation, outcome) {
            (Continuation::Callbacks { on_success, .. }, Ok(response)) => on_success(response),
            (Continuation::Callbacks { on_error, .. }, Err(error)) => on_error(error),
            (Continuation::Channel(tx), outcome) => {
                if tx.send(outcome).is_err() {
                    tracing::debug!(call_id = %self.id, "call outcome dropped, receiver gone");
                }
            }
        }
    }
}

impl<O: fmt::Debug> fmt::Debug for CallContext<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("id", &self.id)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
