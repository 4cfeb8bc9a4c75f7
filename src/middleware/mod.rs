// ABOUTME: HTTP middleware for request-scoped contexts and access logging
// ABOUTME: Interceptors are installed in an explicit order by the web application

/// Per-request access records with pluggable sinks
pub mod access_log;
/// Child scope per request holding the request object
pub mod request_context;

// Access logging
pub use access_log::{
    access_log_middleware, AccessLog, AccessLogSink, AccessLogger, AccessRecord,
    TracingAccessLogger,
};

// Request scoping
pub use request_context::{request_context_middleware, ScopedRequest};
