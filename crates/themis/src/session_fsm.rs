//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Bootstrapping  │ (initial)
//! └────────┬────────┘
//!          │ NoStoredToken / ProfileFailed        ProfileLoaded
//!          ▼                                            │
//! ┌─────────────────┐  SignInRequested  ┌────────────────┐
//! │ Unauthenticated │ ────────────────► │ Authenticating │
//! └─────────────────┘ ◄──────────────── └───────┬────────┘
//!          ▲   SignInFailed / SignOutRequested  │ SignInSucceeded
//!          │                                    ▼
//!          │ SignOutRequested / RefreshFailed ┌───────────────┐
//!          └───────────────────────────────── │ Authenticated │
//!                                             └───────────────┘
//! ```

use crate::UserProfile;
use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Bootstrapping)

    Bootstrapping => {
        NoStoredToken => Unauthenticated,
        ProfileLoaded => Authenticated,
        ProfileFailed => Unauthenticated
    },
    Unauthenticated => {
        SignInRequested => Authenticating
    },
    Authenticating => {
        SignInSucceeded => Authenticated,
        SignInFailed => Unauthenticated,
        SignOutRequested => Unauthenticated
    },
    Authenticated => {
        SignOutRequested => Unauthenticated,
        RefreshFailed => Unauthenticated
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session status for external consumption.
///
/// There is no error status: a failure leaves the session in whichever
/// state the transition table dictates (usually `Unauthenticated`) and the
/// message is carried by [`Session::error`], so `clear_error` never changes
/// the status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Bootstrapping,
    Unauthenticated,
    Authenticating,
    Authenticated,
}

impl From<&SessionMachineState> for SessionStatus {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Bootstrapping => SessionStatus::Bootstrapping,
            SessionMachineState::Unauthenticated => SessionStatus::Unauthenticated,
            SessionMachineState::Authenticating => SessionStatus::Authenticating,
            SessionMachineState::Authenticated => SessionStatus::Authenticated,
        }
    }
}

/// Observable session snapshot.
///
/// `user` is `Some` exactly when `status` is `Authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub error: Option<String>,
}

impl Session {
    pub(crate) fn initial() -> Self {
        Self {
            status: SessionStatus::Bootstrapping,
            user: None,
            error: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// True while bootstrap or sign-in is running.
    pub fn is_loading(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Bootstrapping | SessionStatus::Authenticating
        )
    }
}
