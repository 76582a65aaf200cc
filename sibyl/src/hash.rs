//! Tagged hashes domain-separating the three places the oracle signs or
//! tweaks: announcements, attestations, and nonce derivation.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::secp256k1::Message;

/// Tag for the hash signed in an oracle announcement.
pub const ANNOUNCEMENT_TAG: &str = "DLC/oracle/announcement/v0";
/// Tag for the hash signed in an oracle attestation.
pub const ATTESTATION_TAG: &str = "DLC/oracle/attestation/v0";
/// Tag for the tweak binding a nonce to its event.
pub const NONCE_TAG: &str = "DLC/oracle/nonce/v0";

/// BIP340-style tagged hash: `sha256(sha256(tag) || sha256(tag) || data)`.
pub fn tagged_hash(tag: &str, data: &[u8]) -> [u8; 32] {
    let tag_hash = sha256::Hash::hash(tag.as_bytes());
    let mut engine = sha256::Hash::engine();
    engine.input(tag_hash.as_byte_array());
    engine.input(tag_hash.as_byte_array());
    engine.input(data);
    sha256::Hash::from_engine(engine).to_byte_array()
}

/// Tagged hash of `data` wrapped as a message ready for Schnorr signing.
pub fn tagged_message(tag: &str, data: &[u8]) -> Message {
    Message::from_digest(tagged_hash(tag, data))
}
