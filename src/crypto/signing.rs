//! secp256k1 ECDSA signing/verification and Ethereum-style address
//! derivation (Keccak-256 of the uncompressed public key, last 20 bytes).

use std::fmt;

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::hash::Hash;

/// A validator's on-chain identity: the last 20 bytes of
/// `keccak256(uncompressed_pubkey)`, in the style of an Ethereum address.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub const LENGTH: usize = 20;

    pub const fn zero() -> Self {
        Self([0u8; 20])
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let uncompressed = public_key.0.to_encoded_point(false);
        // Ethereum-style derivation hashes only the 64-byte X||Y part, not
        // the leading 0x04 tag.
        let digest = Hash::digest(&uncompressed.as_bytes()[1..]);
        let mut out = [0u8; Self::LENGTH];
        out.copy_from_slice(&digest.as_bytes()[12..]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// secp256k1 public key backing a validator's consensus identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "public_key_serde")] pub VerifyingKey);

impl PublicKey {
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(bytes)
            .map(PublicKey)
            .map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let digest = Hash::digest(message);
        let ecdsa_sig = match EcdsaSignature::from_bytes((&signature.0[..64]).into()) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        self.0.verify_prehash(digest.as_bytes(), &ecdsa_sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_sec1_bytes()))
    }
}

mod public_key_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &VerifyingKey, ser: S) -> Result<S::Ok, S::Error> {
        hex::encode(key.to_encoded_point(true).as_bytes()).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<VerifyingKey, D::Error> {
        let s = String::deserialize(de)?;
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        VerifyingKey::from_sec1_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// A 65-byte secp256k1 signature: `r || s || v`.
#[derive(Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "hex::serde")] pub [u8; 65]);

impl Signature {
    pub const LENGTH: usize = 65;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != Self::LENGTH {
            return Err(CryptoError::InvalidSignatureLength(bytes.len()));
        }
        let mut out = [0u8; Self::LENGTH];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// A validator's consensus keypair. Only needed by nodes that are
/// themselves validators; peers verify with `PublicKey` alone.
pub struct Keypair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = PublicKey(*signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key)
    }

    /// Signs the Keccak-256 digest of `message` and returns a 65-byte
    /// `r || s || v` signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let digest = Hash::digest(message);
        let (sig, recovery_id): (EcdsaSignature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .expect("signing over a fixed-size digest cannot fail");
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = recovery_id.to_byte();
        Signature(out)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,
    #[error("invalid signature length: expected 65 bytes, got {0}")]
    InvalidSignatureLength(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trips() {
        let keypair = Keypair::generate();
        let message = b"kardia consensus vote bytes";
        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"original");
        assert!(!keypair.public_key().verify(b"tampered", &signature));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let signature = a.sign(b"message");
        assert!(!b.public_key().verify(b"message", &signature));
    }

    #[test]
    fn address_is_deterministic_from_public_key() {
        let keypair = Keypair::generate();
        let a1 = Address::from_public_key(keypair.public_key());
        let a2 = Address::from_public_key(keypair.public_key());
        assert_eq!(a1, a2);
        assert_eq!(a1, keypair.address());
    }

    #[test]
    fn distinct_keypairs_yield_distinct_addresses() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.address(), b.address());
    }
}
