use std::borrow::Cow;

#[mxd_derive::mxd_error]
pub enum MetricsError {
    #[error("Prometheus error{}: {source}", format_context(.context))]
    Prometheus { source: prometheus::Error, context: Option<Cow<'static, str>> },

    /// The exposition route could not be mounted on the transport.
    #[error("Metrics route error{}: {source}", format_context(.context))]
    Transport { source: mxd_appservice::TransportError, context: Option<Cow<'static, str>> },

    #[error("Invalid metrics settings{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// [`crate::MetricPeg`] only accepts one collector.
    #[error("Metrics collector is already set{}", format_context(.context))]
    AlreadySet { context: Option<Cow<'static, str>> },
}
