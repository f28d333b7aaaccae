use thiserror::Error;

/// Error taxonomy for the messaging gateway. Every per-event failure is
/// caught at the event boundary and turned into an `{error}` reply on the
/// calling connection only; handshake failures close the connection with
/// no reply at all.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Handshake credential missing, malformed, expired or forged. The
    /// client sees only a closed connection — missing and invalid are
    /// deliberately indistinguishable.
    #[error("invalid credential")]
    InvalidCredential,

    /// Event arrived on a handle the registry does not know about
    /// (stale, unauthenticated or forged).
    #[error("Unauthorized")]
    Unauthorized,

    /// Unknown message id.
    #[error("Message not found")]
    NotFound,

    /// Read receipt attempted by someone other than the recipient.
    #[error("Forbidden")]
    Forbidden,

    /// Store adapter failure. Not retried; the send/receipt is aborted.
    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}
