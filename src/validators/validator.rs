//! A single validator's identity and voting weight within a `ValidatorSet`.

use serde::{Deserialize, Serialize};

use crate::crypto::{Address, PublicKey};

/// `{Address, PubKey, VotingPower, Accum}` as specified in the data model.
/// Cheap to clone: a `ValidatorSet` snapshot hands these out by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Validator {
    address: Address,
    pub_key: PublicKey,
    voting_power: i64,
    accum: i64,
}

impl Validator {
    /// Builds a validator, deriving its address from `pub_key` so the
    /// `Address == derive(PubKey)` invariant holds by construction.
    pub fn new(pub_key: PublicKey, voting_power: i64) -> Self {
        let address = Address::from_public_key(&pub_key);
        Self {
            address,
            pub_key,
            voting_power,
            accum: 0,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn pub_key(&self) -> &PublicKey {
        &self.pub_key
    }

    pub fn voting_power(&self) -> i64 {
        self.voting_power
    }

    pub fn accum(&self) -> i64 {
        self.accum
    }

    pub(crate) fn set_accum(&mut self, accum: i64) {
        self.accum = accum;
    }
}
