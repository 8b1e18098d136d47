//! turnstile-guard: the decision core of a TURN/STUN relay.
//!
//! The surrounding relay engine owns the sockets, the allocation
//! lifecycle, and the TURN state machine; it calls into this crate at
//! three points: long-term-credential authentication (the credential
//! index), permission creation (the peer admission policy), and STUN
//! Binding requests (the binding responder).

pub mod auth;
pub mod config;
pub mod policy;
pub mod responder;

pub use auth::{long_term_auth_key, AuthKey, CredentialIndex};
pub use config::{ConfigError, GuardConfig};
pub use policy::{same_address_admission, GuardPolicy, RelayGuard};
pub use responder::{handle_binding_request, PacketSink, ResponderError};
