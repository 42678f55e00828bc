pub mod connection;
mod session;

pub use connection::ConnectionState;
pub use session::{CloseKind, Session, SessionAction, SessionMachine, SessionStatus};
