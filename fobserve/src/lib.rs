//! Production-friendly observability hooks for adapter calls, tool execution, and chat streaming.
//!
//! ```rust
//! use fobserve::{MetricsObservabilityHooks, SafeProviderHooks, TracingObservabilityHooks};
//!
//! let _provider_hooks = SafeProviderHooks::new(TracingObservabilityHooks);
//! let _metrics = MetricsObservabilityHooks;
//! ```

mod metrics_hooks;
mod safe_hooks;
mod tracing_hooks;

pub use metrics_hooks::MetricsObservabilityHooks;
pub use safe_hooks::{SafeChatHooks, SafeProviderHooks, SafeToolHooks};
pub use tracing_hooks::TracingObservabilityHooks;

pub mod prelude {
    pub use crate::{
        MetricsObservabilityHooks, SafeChatHooks, SafeProviderHooks, SafeToolHooks,
        TracingObservabilityHooks,
    };
}
