use std::borrow::Cow;

/// A specialized [`BridgeError`] enum of this crate.
#[mxd_derive::mxd_error]
pub enum BridgeError {
    /// The bridge does not provide the requested room.
    #[error("Not bridged{}: {message}", format_context(.context))]
    Unbridged { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Third-party protocol binding was refused.
    #[error("Third-party binding failed{}: {message}", format_context(.context))]
    ThirdParty { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Transport error{}: {source}", format_context(.context))]
    Transport { source: mxd_appservice::TransportError, context: Option<Cow<'static, str>> },

    /// Internal fallback for unexpected issues or logic errors.
    #[error("Internal bridge error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}
