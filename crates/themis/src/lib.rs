//! Themis: session and token lifecycle for the Expediente client.
//!
//! This crate provides:
//! - Session state machine (bootstrap, sign-in, sign-out) via [`SessionManager`]
//! - Authenticated API calls with one refresh-and-replay on 401 via [`AuthGateway`]
//! - Single-flight token refresh via [`TokenRefreshCoordinator`]
//! - Role normalization and permission checks

mod api;
mod error;
mod gateway;
pub mod permissions;
mod profile;
mod refresh;
mod role;
mod session;
mod session_fsm;

pub use api::{
    AuthApi, LoginResponse, MeResponse, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH,
};
pub use error::{AuthError, AuthResult, RefreshError};
pub use gateway::{ApiRequest, ApiResponse, AuthGateway, CallContext};
pub use permissions::PermissionEvaluator;
pub use profile::{UserProfile, WireId, WireUser};
pub use refresh::{InvalidationHook, TokenRefreshCoordinator};
pub use role::{Role, UnknownRole};
pub use session::{SessionManager, SessionStateCallback, DEFAULT_LOGOUT_TIMEOUT};
pub use session_fsm::session_machine;
pub use session_fsm::{
    Session, SessionMachine, SessionMachineInput, SessionMachineState, SessionStatus,
};

pub use credential_store::TokenPair;
pub use reqwest::{Method, StatusCode};
