//! Public extension contracts (request signing, retry policy).
//!
//! The broker never retries or backs off on its own. Callers that want to retry a failed
//! acquisition or directory call consult a [`RetryPolicy`], and custom transports reuse
//! [`RequestSignerExt`] to attach cached tokens to their own request types.

pub mod request_signer;
pub mod retry;

pub use request_signer::*;
pub use retry::*;
