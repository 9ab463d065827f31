use mxd_appservice::TransportError;
use mxd_bridge::BridgeError;
use mxd_store::StoreError;
use std::borrow::Cow;
use std::fmt;

const FATAL_EXIT_CODE: u8 = 1;

/// Failures that stop the bridge before it reaches [`Stage::Running`].
#[mxd_derive::mxd_error]
pub enum StartupError {
    /// The store could not be opened. Not retried.
    #[error("Store initialization failed{}: {source}", format_context(.context))]
    StoreInit { source: StoreError, context: Option<Cow<'static, str>> },

    /// The transport could not be built, subscribed to, or started.
    #[error("Transport failed{}: {source}", format_context(.context))]
    TransportStart { source: TransportError, context: Option<Cow<'static, str>> },

    /// Third-party binding, init or run of the bridge logic failed.
    #[error("Bridge startup failed{}: {source}", format_context(.context))]
    Bridge { source: BridgeError, context: Option<Cow<'static, str>> },

    /// A stage transition out of order.
    #[error("Lifecycle violation{}: {message}", format_context(.context))]
    Lifecycle { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl StartupError {
    /// Every startup failure is fatal.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        FATAL_EXIT_CODE
    }
}

/// Startup stages, in the only order they may be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Idle,
    ConfigLoaded,
    StoreInitializing,
    StoreReady,
    TransportConstructed,
    TransportStarted,
    BridgeInitializing,
    Running,
}

impl Stage {
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::ConfigLoaded),
            Self::ConfigLoaded => Some(Self::StoreInitializing),
            Self::StoreInitializing => Some(Self::StoreReady),
            Self::StoreReady => Some(Self::TransportConstructed),
            Self::TransportConstructed => Some(Self::TransportStarted),
            Self::TransportStarted => Some(Self::BridgeInitializing),
            Self::BridgeInitializing => Some(Self::Running),
            Self::Running => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Active(Stage),
    /// Terminal; `stage` is where the failure happened.
    Failed { stage: Stage, cause: String },
}

/// Forward-only state machine over [`Stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    #[must_use]
    pub const fn new() -> Self {
        Self { state: LifecycleState::Active(Stage::Idle) }
    }

    #[must_use]
    pub const fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Current stage; for a failed lifecycle, the stage that failed.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match &self.state {
            LifecycleState::Active(stage) | LifecycleState::Failed { stage, .. } => *stage,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.state, LifecycleState::Failed { .. })
    }

    /// Moves to `next`, which must directly follow the current stage.
    ///
    /// # Errors
    /// [`StartupError::Lifecycle`] for skipped, repeated or backward
    /// transitions, and for any transition out of a failed state.
    pub fn advance(&mut self, next: Stage) -> Result<(), StartupError> {
        match self.state {
            LifecycleState::Active(current) if current.next() == Some(next) => {
                tracing::debug!(from = ?current, to = ?next, "Lifecycle transition");
                self.state = LifecycleState::Active(next);
                Ok(())
            },
            LifecycleState::Active(current) => Err(StartupError::Lifecycle {
                message: format!("{current} -> {next}").into(),
                context: None,
            }),
            LifecycleState::Failed { stage, .. } => Err(StartupError::Lifecycle {
                message: format!("{stage} already failed").into(),
                context: Some(format!("advancing to {next}").into()),
            }),
        }
    }

    /// Marks the current stage as failed with `cause`. A second failure keeps the first.
    pub fn fail(&mut self, cause: &impl fmt::Display) {
        if let LifecycleState::Active(stage) = self.state {
            self.state = LifecycleState::Failed { stage, cause: cause.to_string() };
        }
    }
}
