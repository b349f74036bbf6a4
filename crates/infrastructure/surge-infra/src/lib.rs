pub mod net;
pub mod signing;

// Re-exports for convenience
pub use net::{default_http_client, CallOutcome, LoginIdentity, TargetClient};
pub use signing::{webhook_headers, SignError, SIGNATURE_HEADER};
