pub mod logging;
pub mod trace_context;

pub use logging::{init_tracing, LogFormat, LoggingSettings};
pub use trace_context::{
    inject_trace_context, TracedRequestExt, TRACEPARENT_HEADER, TRACESTATE_HEADER,
};
