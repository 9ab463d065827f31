use std::borrow::Cow;

#[mxd_derive::mxd_error]
pub enum TransportError {
    #[error("Invalid appservice settings{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The listener could not bind or stopped while starting.
    #[error("Failed to start listener{}: {message}", format_context(.context))]
    Bind { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Appservice is already running{}", format_context(.context))]
    AlreadyStarted { context: Option<Cow<'static, str>> },

    /// The receiving half of an event source was already handed out.
    #[error("Event source '{message}' already has a subscriber{}", format_context(.context))]
    AlreadySubscribed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Event source '{message}' is closed{}", format_context(.context))]
    Closed { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The homeserver answered with a Matrix error body.
    #[error("Homeserver returned {status} {errcode}{}: {message}", format_context(.context))]
    Homeserver {
        status: u16,
        errcode: Cow<'static, str>,
        message: Cow<'static, str>,
        context: Option<Cow<'static, str>>,
    },

    #[error("HTTP error{}: {source}", format_context(.context))]
    Http { source: reqwest::Error, context: Option<Cow<'static, str>> },

    #[error("Appservice storage error{}: {message}", format_context(.context))]
    Storage { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal appservice error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl TransportError {
    /// Matrix error code of a homeserver rejection, if that is what this is.
    #[must_use]
    pub fn errcode(&self) -> Option<&str> {
        match self {
            Self::Homeserver { errcode, .. } => Some(errcode),
            _ => None,
        }
    }
}
