//! Identity and session management: password login, bearer tokens, and the
//! per-request caller context handed to the access policy.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod provider;
mod request_context;
mod session;

pub use principal::{identity_for, Principal};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
pub use request_context::{bearer_token, RequestContext};
pub use session::{Session, SessionManager, SessionToken, TokenKind, TokenPair};
