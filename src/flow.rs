//! Login/logout flow
//!
//! The per-attempt state ([`attempt`]) and the state machine driving the
//! authorization-code exchange ([`machine`]).

pub mod attempt;
pub mod machine;

pub use attempt::{AttemptStore, InMemoryAttemptStore, LoginAttempt, TakenAttempt};
pub use machine::{
	CallbackParams, EstablishedLogin, FlowState, InitiatedLogin, LoginFlow, LogoutOutcome,
};
