//! The request execution proxy.
//!
//! Translates a client-supplied request specification into exactly one
//! outbound HTTP call and normalizes the outcome into an
//! [`ExecutionResult`]. Upstream failures of any kind are reported as data
//! (`status: 0`), never as errors — the proxy's job is to describe what
//! happened, not to fail the API call.

mod executor;
mod spec;

pub use executor::RequestExecutor;
pub use spec::{
    AuthType, BodyType, ExecutionResult, KeyValue, RequestAuth, RequestBody, RequestSpec,
};
