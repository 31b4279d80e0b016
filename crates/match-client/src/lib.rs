//! Online checkers match client.
//!
//! [`session`] holds the match state machine; [`driver`] runs it against
//! the HTTP matchmaker and the WebSocket event channel in [`clients`].

pub mod clients;
pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod session;

pub use config::ClientConfig;
pub use driver::{MatchDriver, SessionHandle};
pub use error::ClientError;
pub use session::{MatchSession, SessionState};
