//! Session state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐  SessionRestored   ┌─────────────────┐
//! │    Anonymous    │ ─────────────────► │  Authenticated  │
//! └────────┬────────┘                    └────────┬────────┘
//!          │ LoginAttempt                         │
//!          ▼                                      │ LoginAttempt
//! ┌─────────────────┐    LoginSuccess             │
//! │ Authenticating  │ ────────────────────────────┤
//! └────────┬────────┘ ◄───────────────────────────┘
//!          │ LoginFailed / LoggedOut
//!          ▼
//!      Anonymous  ◄──── LoggedOut (from any state)
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(Anonymous)

    Anonymous => {
        LoginAttempt => Authenticating,
        // Stored credentials found on startup
        SessionRestored => Authenticated,
        LoggedOut => Anonymous
    },
    Authenticating => {
        LoginSuccess => Authenticated,
        LoginFailed => Anonymous,
        LoggedOut => Anonymous
    },
    Authenticated => {
        // Signing in again, possibly as someone else
        LoginAttempt => Authenticating,
        LoggedOut => Anonymous
    }
}

pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Session state for external consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticating => "authenticating",
            AuthState::Authenticated => "authenticated",
        }
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::Anonymous => AuthState::Anonymous,
            SessionMachineState::Authenticating => AuthState::Authenticating,
            SessionMachineState::Authenticated => AuthState::Authenticated,
        }
    }
}

/// Payload for auth state change callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    pub state: AuthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_anonymous() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::Anonymous);
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticating);

        machine.consume(&SessionMachineInput::LoginSuccess).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_login_failure_returns_to_anonymous() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();

        machine.consume(&SessionMachineInput::LoginFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Anonymous);
    }

    #[test]
    fn test_restored_session_skips_authenticating() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::SessionRestored).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticated);
    }

    #[test]
    fn test_concurrent_login_is_rejected() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::LoginAttempt).unwrap();

        assert!(machine.consume(&SessionMachineInput::LoginAttempt).is_err());
        assert_eq!(*machine.state(), SessionMachineState::Authenticating);
    }

    #[test]
    fn test_cannot_succeed_without_attempt() {
        let mut machine = SessionMachine::new();
        assert!(machine.consume(&SessionMachineInput::LoginSuccess).is_err());
    }

    #[test]
    fn test_logout_from_every_state() {
        for inputs in [
            vec![],
            vec![SessionMachineInput::LoginAttempt],
            vec![SessionMachineInput::SessionRestored],
        ] {
            let mut machine = SessionMachine::new();
            for input in &inputs {
                machine.consume(input).unwrap();
            }
            machine.consume(&SessionMachineInput::LoggedOut).unwrap();
            assert_eq!(*machine.state(), SessionMachineState::Anonymous);
        }
    }

    #[test]
    fn test_auth_state_mapping() {
        assert!(AuthState::from(&SessionMachineState::Authenticated).is_authenticated());
        assert!(!AuthState::from(&SessionMachineState::Authenticating).is_authenticated());
        assert_eq!(
            serde_json::to_string(&AuthState::Anonymous).unwrap(),
            "\"anonymous\""
        );
    }
}
