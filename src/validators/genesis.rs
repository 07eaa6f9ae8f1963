//! Builds a `ValidatorSet` from genesis configuration: a flat list of
//! public keys and voting powers, with no stake/storage/commission
//! machinery — this core assumes a static, externally-agreed validator
//! set.

use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;

use super::{Validator, ValidatorSet, ValidatorSetError};

/// One entry of the genesis validator list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub pub_key: PublicKey,
    pub voting_power: i64,
}

impl GenesisValidator {
    pub fn new(pub_key: PublicKey, voting_power: i64) -> Self {
        Self {
            pub_key,
            voting_power,
        }
    }
}

/// Accumulates genesis validators before sealing them into a `ValidatorSet`.
#[derive(Default)]
pub struct GenesisValidatorSetBuilder {
    entries: Vec<GenesisValidator>,
}

impl GenesisValidatorSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, pub_key: PublicKey, voting_power: i64) -> Self {
        self.entries.push(GenesisValidator::new(pub_key, voting_power));
        self
    }

    pub fn build(self) -> Result<ValidatorSet, ValidatorSetError> {
        let validators = self
            .entries
            .into_iter()
            .map(|entry| Validator::new(entry.pub_key, entry.voting_power))
            .collect();
        ValidatorSet::new(validators)
    }
}
