//! A DLC oracle signer.
//!
//! [`OracleSigner`] owns an oracle keypair derived from a wallet seed,
//! deterministically derives one nonce per `(event id, index)` pair, and
//! produces the two signed messages a DLC needs from its oracle: the
//! [`OracleAnnouncement`] committing to an event's nonces before the outcome
//! is known, and the [`OracleAttestation`] revealing the committed nonce
//! through a signature over the realized outcome.

pub mod backend;
pub mod error;
pub mod hash;
pub mod storage;

use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{SecretKey, XOnlyPublicKey};
use bitcoin::Network;
use tracing::{debug, info};

use crate::backend::{KeyDeriver, SchnorrSigner};
use crate::error::Error;
use crate::hash::{tagged_hash, tagged_message, ANNOUNCEMENT_TAG, ATTESTATION_TAG, NONCE_TAG};

pub use bitcoin;
pub use dlc_messages::oracle_msgs::{
    DigitDecompositionEventDescriptor, EnumEventDescriptor, EventDescriptor, OracleAnnouncement,
    OracleAttestation, OracleEvent,
};
pub use lightning::util::ser::{Readable, Writeable};

/// Purpose index of the oracle master key, the DLC offer message type number
/// used as a BIP43 purpose.
pub const ORACLE_KEY_PURPOSE: u32 = 42778;
/// Purpose index reserving a separate derivation subtree for nonce base keys,
/// so nonce material and the oracle identity key are only related through the
/// seed itself.
pub const NONCE_KEY_PURPOSE: u32 = 585;

/// BIP44 coin type for the network, used only to build derivation paths.
pub fn coin_type(network: Network) -> u32 {
    match network {
        Network::Bitcoin => 0,
        _ => 1,
    }
}

/// Signs oracle announcements and attestations under a single oracle key.
///
/// Nonces are never stored: the scalar for `(event id, index)` is recomputed
/// on demand from the master key, a per-index base key, and a tagged hash
/// binding both to the event id. Everything the signer does is a pure
/// function of its keypair and its inputs, so a signer rebuilt from the same
/// seed produces byte-identical announcements apart from the announcement
/// signature's auxiliary randomness.
pub struct OracleSigner<K: KeyDeriver, S: SchnorrSigner> {
    derivation: K,
    schnorr: S,
    secret_key: SecretKey,
    public_key: XOnlyPublicKey,
    coin_type: u32,
}

impl<K: KeyDeriver, S: SchnorrSigner> OracleSigner<K, S> {
    /// Derive the oracle keypair at `m/42778'/{coin_type}'/0'/0/0` and return
    /// a signer bound to it.
    pub fn build(network: Network, derivation: K, schnorr: S) -> Result<Self, Error> {
        let coin_type = coin_type(network);
        let path = format!("m/{ORACLE_KEY_PURPOSE}'/{coin_type}'/0'/0/0");
        let secret_key = derivation.derive_private_key(&path)?;
        let public_key = schnorr.schnorr_public_key(&secret_key);

        Ok(Self {
            derivation,
            schnorr,
            secret_key,
            public_key,
            coin_type,
        })
    }

    pub fn public_key(&self) -> XOnlyPublicKey {
        self.public_key
    }

    /// Create a signed announcement for an event with enumerated outcomes,
    /// committing to one nonce per outcome.
    pub fn create_enum_announcement(
        &self,
        event_id: &str,
        event_maturity_epoch: u32,
        outcomes: Vec<String>,
    ) -> Result<OracleAnnouncement, Error> {
        if outcomes.is_empty() {
            return Err(Error::InvalidDescriptor(
                "an enumerated event needs at least one outcome".to_string(),
            ));
        }

        let oracle_nonces = self.derive_public_nonces(event_id, outcomes.len())?;
        let event_descriptor = EventDescriptor::EnumEvent(EnumEventDescriptor { outcomes });
        self.announce(event_id, event_maturity_epoch, event_descriptor, oracle_nonces)
    }

    /// Create a signed announcement for a numeric event, committing to one
    /// nonce per digit plus one for the sign when the outcome is signed.
    ///
    /// The attestation side of digit decomposition is not implemented; these
    /// announcements exist so counterparties can build contracts against
    /// oracles that will attest elsewhere.
    pub fn create_digit_decomposition_announcement(
        &self,
        event_id: &str,
        event_maturity_epoch: u32,
        descriptor: DigitDecompositionEventDescriptor,
    ) -> Result<OracleAnnouncement, Error> {
        validate_digit_descriptor(&descriptor)?;

        let nonces_needed = descriptor.nb_digits as usize + usize::from(descriptor.is_signed);
        let oracle_nonces = self.derive_public_nonces(event_id, nonces_needed)?;
        self.announce(
            event_id,
            event_maturity_epoch,
            EventDescriptor::DigitDecompositionEvent(descriptor),
            oracle_nonces,
        )
    }

    /// Sign the realized outcome of an enumerated event with the nonce
    /// committed to in the announcement.
    ///
    /// The nonce is re-derived and byte-compared against the announcement
    /// before signing; a mismatch means the event id is wrong, the
    /// announcement was corrupted in transport, or it belongs to a different
    /// oracle, and signing under it would be unsound. Attesting to two
    /// different outcomes for the same event reveals the nonce under two
    /// messages and with it the oracle key; the signer does not track past
    /// attestations, so that protection has to come from the caller (see
    /// [`storage`]).
    pub fn create_enum_attestation(
        &self,
        oracle_event: &OracleEvent,
        outcome: &str,
    ) -> Result<OracleAttestation, Error> {
        validate_oracle_event(oracle_event)?;

        let descriptor = match &oracle_event.event_descriptor {
            EventDescriptor::EnumEvent(descriptor) => descriptor,
            EventDescriptor::DigitDecompositionEvent(_) => {
                return Err(Error::UnsupportedDescriptor("digit decomposition"))
            }
        };
        if !descriptor.outcomes.iter().any(|o| o == outcome) {
            return Err(Error::InvalidOutcome(outcome.to_string()));
        }

        let nonce_key = self.nonce_key(&oracle_event.event_id, 0)?;
        let rederived = self.schnorr.schnorr_public_key(&nonce_key);
        if rederived.serialize() != oracle_event.oracle_nonces[0].serialize() {
            return Err(Error::NonceMismatch);
        }

        let msg = tagged_message(ATTESTATION_TAG, outcome.as_bytes());
        let signature = self.schnorr.sign_with_nonce(&self.secret_key, &msg, &nonce_key);
        if !self.schnorr.verify(&signature, &msg, &self.public_key) {
            return Err(Error::Internal("attestation signature failed self verification"));
        }

        info!(event_id = %oracle_event.event_id, outcome, "created oracle attestation");

        Ok(OracleAttestation {
            event_id: oracle_event.event_id.clone(),
            oracle_public_key: self.public_key,
            signatures: vec![signature],
            outcomes: vec![outcome.to_string()],
        })
    }

    /// Derive the private nonce scalar for `(event_id, index)`.
    ///
    /// The scalar is the master key additively tweaked by
    /// `tagged_hash("DLC/oracle/nonce/v0", base_pubkey || event_id)`, where
    /// the base key sits at `m/585'/{coin_type}'/0'/0/{index}`. Distinct
    /// events produce unrelated scalars even at the same index, and knowing
    /// one scalar reveals neither the master key nor other nonces.
    pub fn nonce_key(&self, event_id: &str, index: u32) -> Result<SecretKey, Error> {
        let path = format!("m/{NONCE_KEY_PURPOSE}'/{}'/0'/0/{index}", self.coin_type);
        debug!(%path, event_id, "deriving nonce base key");
        let base_key = self.derivation.derive_private_key(&path)?;
        let tweak = self.nonce_tweak(event_id, &base_key);
        self.schnorr.tweak_add(&self.secret_key, &tweak)
    }

    fn nonce_tweak(&self, event_id: &str, base_key: &SecretKey) -> [u8; 32] {
        let base_pubkey = self.schnorr.schnorr_public_key(base_key);
        let mut data = Vec::with_capacity(32 + event_id.len());
        data.extend_from_slice(&base_pubkey.serialize());
        data.extend_from_slice(event_id.as_bytes());
        tagged_hash(NONCE_TAG, &data)
    }

    fn derive_public_nonces(
        &self,
        event_id: &str,
        count: usize,
    ) -> Result<Vec<XOnlyPublicKey>, Error> {
        (0..count as u32)
            .map(|index| {
                let nonce_key = self.nonce_key(event_id, index)?;
                Ok(self.schnorr.schnorr_public_key(&nonce_key))
            })
            .collect()
    }

    fn announce(
        &self,
        event_id: &str,
        event_maturity_epoch: u32,
        event_descriptor: EventDescriptor,
        oracle_nonces: Vec<XOnlyPublicKey>,
    ) -> Result<OracleAnnouncement, Error> {
        let oracle_event = OracleEvent {
            oracle_nonces,
            event_maturity_epoch,
            event_descriptor,
            event_id: event_id.to_string(),
        };
        let announcement_signature = self.sign_oracle_event(&oracle_event)?;

        info!(
            event_id,
            nonces = oracle_event.oracle_nonces.len(),
            "created oracle announcement"
        );

        Ok(OracleAnnouncement {
            announcement_signature,
            oracle_public_key: self.public_key,
            oracle_event,
        })
    }

    fn sign_oracle_event(&self, oracle_event: &OracleEvent) -> Result<Signature, Error> {
        let mut data = Vec::new();
        oracle_event.write(&mut data).map_err(|_| Error::Serialization)?;
        let msg = tagged_message(ANNOUNCEMENT_TAG, &data);
        Ok(self.schnorr.sign(&self.secret_key, &msg))
    }
}

/// Check an attestation against its announcement: same oracle key, one
/// signature per outcome, every signature valid over its outcome's
/// attestation hash and committing to the corresponding announced nonce.
pub fn verify_attestation<S: SchnorrSigner>(
    schnorr: &S,
    announcement: &OracleAnnouncement,
    attestation: &OracleAttestation,
) -> Result<(), Error> {
    if announcement.oracle_public_key != attestation.oracle_public_key {
        return Err(Error::InvalidEvent("oracle public key mismatch".to_string()));
    }
    if attestation.signatures.is_empty()
        || attestation.signatures.len() != attestation.outcomes.len()
        || attestation.signatures.len() > announcement.oracle_event.oracle_nonces.len()
    {
        return Err(Error::InvalidEvent(
            "signature count does not match outcomes".to_string(),
        ));
    }

    for (index, (outcome, signature)) in attestation
        .outcomes
        .iter()
        .zip(&attestation.signatures)
        .enumerate()
    {
        let msg = tagged_message(ATTESTATION_TAG, outcome.as_bytes());
        if !schnorr.verify(signature, &msg, &announcement.oracle_public_key) {
            return Err(Error::InvalidEvent(format!(
                "signature over outcome {outcome} does not verify"
            )));
        }
        let nonce = &announcement.oracle_event.oracle_nonces[index];
        if signature.serialize()[..32] != nonce.serialize() {
            return Err(Error::NonceMismatch);
        }
    }

    Ok(())
}

fn validate_oracle_event(oracle_event: &OracleEvent) -> Result<(), Error> {
    if oracle_event.event_id.is_empty() {
        return Err(Error::InvalidEvent("empty event id".to_string()));
    }
    if oracle_event.oracle_nonces.is_empty() {
        return Err(Error::InvalidEvent("event carries no nonces".to_string()));
    }

    let expected = match &oracle_event.event_descriptor {
        EventDescriptor::EnumEvent(descriptor) => {
            if descriptor.outcomes.is_empty() {
                return Err(Error::InvalidEvent(
                    "enumerated descriptor has no outcomes".to_string(),
                ));
            }
            descriptor.outcomes.len()
        }
        EventDescriptor::DigitDecompositionEvent(descriptor) => {
            descriptor.nb_digits as usize + usize::from(descriptor.is_signed)
        }
    };
    if oracle_event.oracle_nonces.len() != expected {
        return Err(Error::InvalidEvent(format!(
            "expected {expected} nonces, event carries {}",
            oracle_event.oracle_nonces.len()
        )));
    }

    Ok(())
}

fn validate_digit_descriptor(descriptor: &DigitDecompositionEventDescriptor) -> Result<(), Error> {
    if descriptor.nb_digits == 0 {
        return Err(Error::InvalidDescriptor("nb_digits must be nonzero".to_string()));
    }
    if descriptor.base < 2 {
        return Err(Error::InvalidDescriptor(format!(
            "invalid base {}",
            descriptor.base
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use bitcoin::bip32::Xpriv;
    use bitcoin::key::rand::{thread_rng, Rng};
    use bitcoin::secp256k1::SecretKey;

    use super::*;
    use crate::backend::{SecpSchnorrSigner, XprivKeyDeriver};

    type TestSigner = OracleSigner<XprivKeyDeriver, SecpSchnorrSigner>;

    fn random_seed() -> [u8; 64] {
        let mut seed = [0u8; 64];
        thread_rng().fill(&mut seed);
        seed
    }

    fn signer_from_seed(network: Network, seed: [u8; 64]) -> TestSigner {
        let xpriv = Xpriv::new_master(network, &seed).unwrap();
        OracleSigner::build(network, XprivKeyDeriver::new(xpriv), SecpSchnorrSigner::new())
            .unwrap()
    }

    fn test_signer() -> TestSigner {
        signer_from_seed(Network::Regtest, random_seed())
    }

    fn digit_descriptor(nb_digits: u16, is_signed: bool) -> DigitDecompositionEventDescriptor {
        DigitDecompositionEventDescriptor {
            base: 2,
            is_signed,
            unit: "sats/sec".to_string(),
            precision: 0,
            nb_digits,
        }
    }

    #[test]
    fn nonce_key_is_deterministic() {
        let seed = random_seed();
        let signer = signer_from_seed(Network::Regtest, seed);

        let a = signer.nonce_key("event", 3).unwrap();
        let b = signer.nonce_key("event", 3).unwrap();
        assert_eq!(a, b);

        // a signer rebuilt from the same seed derives the same scalar
        let rebuilt = signer_from_seed(Network::Regtest, seed);
        assert_eq!(a, rebuilt.nonce_key("event", 3).unwrap());

        assert_ne!(a, signer.nonce_key("event", 4).unwrap());
    }

    #[test]
    fn nonce_tweaks_distinct_across_events() {
        let signer = test_signer();
        let base_key = signer
            .derivation
            .derive_private_key("m/585'/1'/0'/0/0")
            .unwrap();

        let tweaks: HashSet<[u8; 32]> = (0..100)
            .map(|i| signer.nonce_tweak(&format!("event-{i}"), &base_key))
            .collect();
        assert_eq!(tweaks.len(), 100);
    }

    #[test]
    fn announcement_signature_verifies() {
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("test", 100, vec!["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(announcement.oracle_event.oracle_nonces.len(), 2);
        assert_eq!(announcement.oracle_public_key, signer.public_key());

        let msg = tagged_message(ANNOUNCEMENT_TAG, &announcement.oracle_event.encode());
        assert!(SecpSchnorrSigner::new().verify(
            &announcement.announcement_signature,
            &msg,
            &announcement.oracle_public_key,
        ));
    }

    #[test]
    fn attestation_selects_single_outcome() {
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("pick-one", 100, vec!["yes".to_string(), "no".to_string()])
            .unwrap();

        let attestation = signer
            .create_enum_attestation(&announcement.oracle_event, "yes")
            .unwrap();
        assert_eq!(attestation.outcomes, vec!["yes".to_string()]);
        assert_eq!(attestation.signatures.len(), 1);
        assert_eq!(attestation.event_id, "pick-one");

        let msg = tagged_message(ATTESTATION_TAG, b"yes");
        assert!(SecpSchnorrSigner::new().verify(
            &attestation.signatures[0],
            &msg,
            &attestation.oracle_public_key,
        ));
    }

    #[test]
    fn double_attestation_reuses_the_nonce() {
        // Nothing in the signer prevents attesting both outcomes; doing so
        // reveals the announced nonce under two messages, which is exactly
        // the condition that leaks the oracle key.
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("leaky", 100, vec!["yes".to_string(), "no".to_string()])
            .unwrap();

        let yes = signer
            .create_enum_attestation(&announcement.oracle_event, "yes")
            .unwrap();
        let no = signer
            .create_enum_attestation(&announcement.oracle_event, "no")
            .unwrap();

        let announced = announcement.oracle_event.oracle_nonces[0].serialize();
        assert_eq!(&yes.signatures[0].serialize()[..32], announced.as_slice());
        assert_eq!(&no.signatures[0].serialize()[..32], announced.as_slice());
        assert_ne!(yes.signatures[0], no.signatures[0]);

        let msg = tagged_message(ATTESTATION_TAG, b"no");
        assert!(SecpSchnorrSigner::new().verify(
            &no.signatures[0],
            &msg,
            &announcement.oracle_public_key
        ));
    }

    #[test]
    fn corrupted_nonce_is_refused() {
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("tampered", 100, vec!["a".to_string(), "b".to_string()])
            .unwrap();

        let mut oracle_event = announcement.oracle_event;
        let unrelated = SecretKey::new(&mut thread_rng());
        oracle_event.oracle_nonces[0] =
            SecpSchnorrSigner::new().schnorr_public_key(&unrelated);

        let err = signer.create_enum_attestation(&oracle_event, "a").unwrap_err();
        assert!(matches!(err, Error::NonceMismatch));
    }

    #[test]
    fn digit_decomposition_attestation_is_unsupported() {
        let signer = test_signer();
        let announcement = signer
            .create_digit_decomposition_announcement("numeric", 100, digit_descriptor(8, false))
            .unwrap();

        let err = signer
            .create_enum_attestation(&announcement.oracle_event, "42")
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDescriptor(_)));
    }

    #[test]
    fn digit_decomposition_nonce_counts() {
        let signer = test_signer();

        let unsigned = signer
            .create_digit_decomposition_announcement("unsigned", 100, digit_descriptor(8, false))
            .unwrap();
        assert_eq!(unsigned.oracle_event.oracle_nonces.len(), 8);

        let signed = signer
            .create_digit_decomposition_announcement("signed", 100, digit_descriptor(8, true))
            .unwrap();
        assert_eq!(signed.oracle_event.oracle_nonces.len(), 9);
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        let signer = test_signer();

        let err = signer
            .create_digit_decomposition_announcement("zero", 100, digit_descriptor(0, false))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));

        let mut unary = digit_descriptor(8, false);
        unary.base = 1;
        let err = signer
            .create_digit_decomposition_announcement("unary", 100, unary)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));

        let err = signer
            .create_enum_announcement("no-outcomes", 100, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));
    }

    #[test]
    fn malformed_event_is_rejected() {
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("truncated", 100, vec!["a".to_string(), "b".to_string()])
            .unwrap();

        let mut oracle_event = announcement.oracle_event;
        oracle_event.oracle_nonces.pop();
        let err = signer.create_enum_attestation(&oracle_event, "a").unwrap_err();
        assert!(matches!(err, Error::InvalidEvent(_)));
    }

    #[test]
    fn unlisted_outcome_is_rejected() {
        let signer = test_signer();
        let announcement = signer
            .create_enum_announcement("binary", 100, vec!["yes".to_string(), "no".to_string()])
            .unwrap();

        let err = signer
            .create_enum_attestation(&announcement.oracle_event, "maybe")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOutcome(_)));
    }

    #[test]
    fn verify_attestation_accepts_and_rejects() {
        let signer = test_signer();
        let schnorr = SecpSchnorrSigner::new();
        let announcement = signer
            .create_enum_announcement("checked", 100, vec!["up".to_string(), "down".to_string()])
            .unwrap();
        let attestation = signer
            .create_enum_attestation(&announcement.oracle_event, "up")
            .unwrap();

        assert!(verify_attestation(&schnorr, &announcement, &attestation).is_ok());

        // claiming a different outcome than the one signed must fail
        let mut lying = attestation.clone();
        lying.outcomes = vec!["down".to_string()];
        assert!(verify_attestation(&schnorr, &announcement, &lying).is_err());

        // an attestation from another oracle must fail
        let other = test_signer();
        let foreign = other
            .create_enum_announcement("checked", 100, vec!["up".to_string(), "down".to_string()])
            .unwrap();
        let foreign_attestation = other
            .create_enum_attestation(&foreign.oracle_event, "up")
            .unwrap();
        assert!(verify_attestation(&schnorr, &announcement, &foreign_attestation).is_err());
    }

    #[test]
    fn end_to_end_announce_then_attest() {
        let signer = signer_from_seed(Network::Testnet, random_seed());
        let announcement = signer
            .create_enum_announcement(
                "election-2024",
                1735689600,
                vec!["trump".to_string(), "harris".to_string()],
            )
            .unwrap();

        assert_eq!(announcement.oracle_event.oracle_nonces.len(), 2);
        assert_eq!(announcement.oracle_event.event_maturity_epoch, 1735689600);
        assert_eq!(announcement.oracle_public_key.serialize().len(), 32);

        let schnorr = SecpSchnorrSigner::new();
        let announcement_msg =
            tagged_message(ANNOUNCEMENT_TAG, &announcement.oracle_event.encode());
        assert!(schnorr.verify(
            &announcement.announcement_signature,
            &announcement_msg,
            &announcement.oracle_public_key,
        ));

        let attestation = signer
            .create_enum_attestation(&announcement.oracle_event, "trump")
            .unwrap();
        assert_eq!(attestation.outcomes, vec!["trump".to_string()]);
        assert_eq!(attestation.signatures.len(), 1);

        let attestation_msg = tagged_message(ATTESTATION_TAG, b"trump");
        assert!(schnorr.verify(
            &attestation.signatures[0],
            &attestation_msg,
            &announcement.oracle_public_key,
        ));
        assert_eq!(
            &attestation.signatures[0].serialize()[..32],
            announcement.oracle_event.oracle_nonces[0].serialize().as_slice()
        );

        assert!(verify_attestation(&schnorr, &announcement, &attestation).is_ok());

        println!("{}", hex::encode(announcement.encode()));
        println!("{}", hex::encode(attestation.encode()));
    }
}
