//! Central identity and session types for the gate and its provider seam.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod request_context;

pub use principal::{Principal, Attrs};
pub use session::{SessionDescriptor, SessionToken, SessionManager};
pub use provider::{
    SessionProvider, MemorySessionProvider, CredentialStore, LoginError, LoginRequest,
    LoginResponse,
};
pub use request_context::{RequestContext, SESSION_COOKIE};
