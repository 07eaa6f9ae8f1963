//! Cryptographic primitives and identities: Keccak-256 hashing,
//! secp256k1 ECDSA signing/verification, and Ethereum-style address
//! derivation.

mod hash;
mod signing;

pub use hash::Hash;
pub use signing::{Address, CryptoError, Keypair, PublicKey, Signature};

/// A value that can produce deterministic, canonical bytes to be hashed or
/// signed. Implementors must exclude any signature field from these bytes.
pub trait CanonicalBytes {
    fn canonical_bytes(&self) -> Vec<u8>;
}
