//! Authentication: token storage and the session manager

pub mod session;
pub mod tokens;

pub use session::{AuthError, Session, SessionManager, SessionStatus};
#[cfg(test)]
pub use tokens::MemoryTokenStore;
pub use tokens::{token_expiry, TokenPair, TokenStore};
