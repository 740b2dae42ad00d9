//! Session lifecycle for the Leaguer client.
//!
//! This crate provides:
//! - Password and social sign-in, with the storage tier chosen per login
//! - Logout that always clears local state, even if the server is unreachable
//! - Profile and password updates that keep the cached user in step
//! - An explicit FSM-based auth state with change callbacks
//! - `LeaguerSession`, the application root wiring store, gateway and channel

mod auth_fsm;
mod error;
mod link;
mod models;
mod orchestrator;
mod session;

#[cfg(test)]
mod tests;

pub use auth_fsm::session_machine;
pub use auth_fsm::{
    AuthState, AuthStateChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState,
};
pub use error::{AuthError, AuthResult};
pub use link::LiveLink;
pub use models::{
    ClientPlatform, LoginCredentials, ProfileUpdate, SocialLoginRequest, SocialProvider,
    LOGOUT_PATH, PASSWORD_RESET_PATH, SIGN_IN_PATH, SOCIAL_SIGN_IN_PATH, UPDATE_PROFILE_PATH,
    VERIFICATION_EMAIL_PATH,
};
pub use orchestrator::{
    AuthStateCallback, OrchestratorConfig, SessionOrchestrator, MSG_LOGIN_REMEMBERED,
    MSG_LOGIN_SUCCESS, MSG_LOGOUT_SUCCESS, MSG_PASSWORD_CHANGED, MSG_PROFILE_UPDATED,
    MSG_WRONG_PASSWORD,
};
pub use session::LeaguerSession;
