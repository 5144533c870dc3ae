//! Connection sessions for Gambit.
//!
//! A session is the only identity Gambit knows about: a random id issued
//! when a socket is accepted and forgotten when it closes. There are no
//! accounts and no reconnection tokens. A participant who drops and comes
//! back is a new session.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← seats sessions in rooms, routes broadcasts by id
//!     ↕
//! Session Layer (this crate)  ← issues ids, remembers which room each occupies
//!     ↕
//! Protocol Layer (below)  ← provides SessionId, RoomId
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig};
