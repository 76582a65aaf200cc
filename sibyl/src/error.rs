/// Oracle error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The derivation backend could not produce a key at the requested path.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    /// An operation was invoked before the oracle keypair existed. Cannot
    /// occur for a signer obtained through `OracleSigner::build`, which only
    /// returns once both keys are in place.
    #[error("oracle keypair is not initialized")]
    UninitializedKey,
    /// The event descriptor is internally inconsistent.
    #[error("invalid event descriptor: {0}")]
    InvalidDescriptor(String),
    /// The oracle event is malformed.
    #[error("invalid oracle event: {0}")]
    InvalidEvent(String),
    /// Attestation was requested for a descriptor kind this oracle does not
    /// sign.
    #[error("{0} events cannot be attested")]
    UnsupportedDescriptor(&'static str),
    /// The re-derived nonce does not match the one published in the
    /// announcement. Signing anyway could reveal the oracle key, so the
    /// attestation is refused.
    #[error("derived nonce does not match the announced nonce")]
    NonceMismatch,
    /// The outcome is not listed in the event descriptor.
    #[error("outcome not listed in the event descriptor: {0}")]
    InvalidOutcome(String),
    /// The event already has a recorded attestation.
    #[error("event {0} already has an attestation")]
    AlreadyAttested(String),
    /// No event data stored under the given id.
    #[error("event not found: {0}")]
    NotFound(String),
    /// The storage failed to read or save data.
    #[error("storage failure: {0}")]
    Storage(String),
    /// Serializing an oracle event for signing failed.
    #[error("oracle event serialization failed")]
    Serialization,
    /// An error that should never happen, if it does it's a bug.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
