//! The middleware contract.
//!
//! Every processing unit registered with the framework implements
//! [`Middleware`]. The executor drives units with an explicit loop over the
//! sorted chain; a unit never calls into the rest of the chain itself, it
//! signals continuation through its return value and the execution context.
//!
//! # Example
//!
//! ```
//! use daedalus_core::middleware::{BoxFuture, ErrorDecision, Middleware};
//! use daedalus_core::context::{ExecutionContext, RequestContext};
//! use daedalus_core::error::MiddlewareError;
//!
//! struct RequestLogger;
//!
//! impl Middleware for RequestLogger {
//!     fn execute<'a>(
//!         &'a self,
//!         ctx: &'a mut ExecutionContext,
//!     ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
//!         Box::pin(async move {
//!             tracing::info!(path = %ctx.request().path, "request seen");
//!             Ok(())
//!         })
//!     }
//!
//!     fn should_execute(&self, ctx: &RequestContext) -> bool {
//!         !ctx.is_health_probe()
//!     }
//!
//!     fn on_error(&self, _error: &MiddlewareError, _ctx: &RequestContext) -> ErrorDecision {
//!         // Logging failures never block the chain.
//!         ErrorDecision::proceed()
//!     }
//! }
//! ```

use crate::context::{ExecutionContext, RequestContext};
use crate::error::MiddlewareError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed future, as returned by middleware execution.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit's decision after one of its executions failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDecision {
    /// `true` to let the chain proceed past this failure.
    pub should_continue: bool,
    /// Response body to return when terminating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Status code to return when terminating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ErrorDecision {
    /// Terminate the chain with no response payload.
    #[must_use]
    pub fn halt() -> Self {
        Self {
            should_continue: false,
            response: None,
            status_code: None,
        }
    }

    /// Terminate the chain with a status code and optional body.
    #[must_use]
    pub fn halt_with(status_code: u16, response: Option<serde_json::Value>) -> Self {
        Self {
            should_continue: false,
            response,
            status_code: Some(status_code),
        }
    }

    /// Let the chain continue past the failure.
    #[must_use]
    pub fn proceed() -> Self {
        Self {
            should_continue: true,
            response: None,
            status_code: None,
        }
    }
}

/// The contract every registered processing unit implements.
///
/// # Invariants
///
/// - `execute` must honor cancellation: the executor drops the future when
///   the unit's timeout elapses, and dropped work must not leave shared
///   state half-mutated.
/// - `should_execute` and `on_error` must be cheap and side-effect free;
///   they run synchronously during chain construction and error recovery.
pub trait Middleware: Send + Sync + 'static {
    /// Processes the request.
    ///
    /// Mutating `ctx.request_mut().metadata` is the supported way to pass
    /// data to later units. Calling
    /// [`terminate`](ExecutionContext::terminate) stops the chain after this
    /// unit returns.
    fn execute<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>>;

    /// Returns `true` if this unit wants to run for the given request.
    ///
    /// Evaluated during chain construction, after the enabled flag and
    /// before declarative conditions.
    fn should_execute(&self, _ctx: &RequestContext) -> bool {
        true
    }

    /// Readiness probe used by the health checker.
    ///
    /// The default delegates to [`should_execute`](Self::should_execute).
    /// Units with genuinely asynchronous readiness (connection pools,
    /// downstream dependencies) should override this; the health checker
    /// races it against a timeout and retries on expiry.
    fn probe<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, bool> {
        Box::pin(async move { self.should_execute(ctx) })
    }

    /// Decides how the chain reacts to this unit failing.
    ///
    /// The default halts the chain. A halt decision always wins: global
    /// `continue_on_error` policy can force a failure to propagate, but it
    /// can never override a unit's own termination.
    fn on_error(&self, _error: &MiddlewareError, _ctx: &RequestContext) -> ErrorDecision {
        ErrorDecision::halt()
    }
}

/// A middleware built from an async closure, for tests and simple units.
pub struct FnMiddleware<F> {
    func: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<(), MiddlewareError>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps the closure as a middleware.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<(), MiddlewareError>>
        + Send
        + Sync
        + 'static,
{
    fn execute<'a>(
        &'a self,
        ctx: &'a mut ExecutionContext,
    ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
        (self.func)(ctx)
    }
}

/// Sink for per-execution usage samples.
///
/// Implemented by the telemetry layer; the framework feeds it one sample per
/// executed unit so usage analytics stay decoupled from execution.
pub trait UsageRecorder: Send + Sync {
    /// Records one execution of `name`, with its wall time when measured.
    fn record_usage(&self, name: &str, execution_time: Option<Duration>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApplicationContext;

    struct Tagging;

    impl Middleware for Tagging {
        fn execute<'a>(
            &'a self,
            ctx: &'a mut ExecutionContext,
        ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
            Box::pin(async move {
                ctx.request_mut()
                    .set_metadata("tagged", serde_json::Value::Bool(true));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_execute_mutates_metadata() {
        let request = RequestContext::new("GET", "/", ApplicationContext::Global);
        let mut ctx = ExecutionContext::new(request);

        Tagging.execute(&mut ctx).await.expect("executes");
        assert_eq!(
            ctx.request().metadata_value("tagged"),
            Some(&serde_json::Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_default_probe_delegates_to_should_execute() {
        struct Declining;
        impl Middleware for Declining {
            fn execute<'a>(
                &'a self,
                _ctx: &'a mut ExecutionContext,
            ) -> BoxFuture<'a, Result<(), MiddlewareError>> {
                Box::pin(async { Ok(()) })
            }

            fn should_execute(&self, _ctx: &RequestContext) -> bool {
                false
            }
        }

        let request = RequestContext::new("GET", "/", ApplicationContext::System);
        assert!(!Declining.probe(&request).await);
        assert!(Tagging.probe(&request).await);
    }

    #[test]
    fn test_default_on_error_halts() {
        let request = RequestContext::new("GET", "/", ApplicationContext::Global);
        let err = MiddlewareError::execution("tagging", "boom");
        let decision = Tagging.on_error(&err, &request);
        assert!(!decision.should_continue);
    }

    fn set_fn_flag(ctx: &mut ExecutionContext) -> BoxFuture<'_, Result<(), MiddlewareError>> {
        Box::pin(async move {
            ctx.request_mut()
                .set_metadata("fn", serde_json::Value::Bool(true));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_fn_middleware() {
        let mw = FnMiddleware::new(set_fn_flag);

        let request = RequestContext::new("GET", "/", ApplicationContext::Global);
        let mut ctx = ExecutionContext::new(request);
        mw.execute(&mut ctx).await.expect("executes");
        assert!(ctx.request().metadata_value("fn").is_some());
    }
}
