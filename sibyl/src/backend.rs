//! Collaborator interfaces the oracle is built on: hierarchical key
//! derivation from the wallet seed, and the Schnorr primitives. Both are
//! handed to [`OracleSigner`](crate::OracleSigner) at construction and never
//! swapped afterwards.

use std::str::FromStr;

use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::key::rand::{thread_rng, Rng};
use bitcoin::secp256k1::schnorr::Signature;
use bitcoin::secp256k1::{All, Message, Scalar, Secp256k1, SecretKey, XOnlyPublicKey};
use secp256k1_zkp::Keypair;

use crate::error::Error;

/// Private key derivation addressed by a BIP32 path string with hardened
/// markers, e.g. `m/585'/1'/0'/0/7`.
pub trait KeyDeriver {
    fn derive_private_key(&self, path: &str) -> Result<SecretKey, Error>;
}

/// Schnorr operations the oracle needs. All of them are pure; implementations
/// must not keep mutable state between calls.
pub trait SchnorrSigner {
    /// X-only public key for a private key.
    fn schnorr_public_key(&self, privkey: &SecretKey) -> XOnlyPublicKey;

    /// BIP340 signature with fresh random auxiliary data. Used for
    /// announcement signatures, where the signing nonce carries no meaning.
    fn sign(&self, privkey: &SecretKey, msg: &Message) -> Signature;

    /// BIP340 signature using `nonce` as the signing nonce instead of a
    /// generated one. Used for attestations, where the nonce was committed to
    /// in the announcement and is revealed by the signature.
    fn sign_with_nonce(&self, privkey: &SecretKey, msg: &Message, nonce: &SecretKey) -> Signature;

    /// Additively tweak a private key.
    fn tweak_add(&self, privkey: &SecretKey, tweak: &[u8; 32]) -> Result<SecretKey, Error>;

    /// Verify a BIP340 signature.
    fn verify(&self, signature: &Signature, msg: &Message, pubkey: &XOnlyPublicKey) -> bool;
}

/// [`KeyDeriver`] backed by an extended private key held in memory.
pub struct XprivKeyDeriver {
    xpriv: Xpriv,
    secp: Secp256k1<All>,
}

impl XprivKeyDeriver {
    pub fn new(xpriv: Xpriv) -> Self {
        Self {
            xpriv,
            secp: Secp256k1::new(),
        }
    }
}

impl KeyDeriver for XprivKeyDeriver {
    fn derive_private_key(&self, path: &str) -> Result<SecretKey, Error> {
        let path =
            DerivationPath::from_str(path).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        Ok(self
            .xpriv
            .derive_priv(&self.secp, &path)
            .map_err(|e| Error::KeyDerivation(e.to_string()))?
            .private_key)
    }
}

/// [`SchnorrSigner`] backed by libsecp256k1.
pub struct SecpSchnorrSigner {
    secp: Secp256k1<All>,
}

impl SecpSchnorrSigner {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for SecpSchnorrSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl SchnorrSigner for SecpSchnorrSigner {
    fn schnorr_public_key(&self, privkey: &SecretKey) -> XOnlyPublicKey {
        privkey.x_only_public_key(&self.secp).0
    }

    fn sign(&self, privkey: &SecretKey, msg: &Message) -> Signature {
        let key_pair = Keypair::from_secret_key(&self.secp, privkey);
        let mut aux = [0u8; 32];
        thread_rng().fill(&mut aux);
        self.secp.sign_schnorr_with_aux_rand(msg, &key_pair, &aux)
    }

    fn sign_with_nonce(&self, privkey: &SecretKey, msg: &Message, nonce: &SecretKey) -> Signature {
        let key_pair = Keypair::from_secret_key(&self.secp, privkey);
        dlc::secp_utils::schnorrsig_sign_with_nonce(&self.secp, msg, &key_pair, &nonce.secret_bytes())
    }

    fn tweak_add(&self, privkey: &SecretKey, tweak: &[u8; 32]) -> Result<SecretKey, Error> {
        let tweak =
            Scalar::from_be_bytes(*tweak).map_err(|e| Error::KeyDerivation(e.to_string()))?;
        (*privkey)
            .add_tweak(&tweak)
            .map_err(|e| Error::KeyDerivation(e.to_string()))
    }

    fn verify(&self, signature: &Signature, msg: &Message, pubkey: &XOnlyPublicKey) -> bool {
        self.secp.verify_schnorr(signature, msg, pubkey).is_ok()
    }
}
