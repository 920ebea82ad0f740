pub mod crypto;
pub mod secret;

pub use crypto::{SealError, TokenSealer};
pub use secret::{bearer_token, verify_shared_secret};
