//! Structured DCDT token model

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use simchain_core::{Nonce, Specified, TokenMetadata};

/// Upper bound for royalties, in basis points
pub const MAX_ROYALTIES: u32 = 10_000;

/// Length of the per-instance user metadata
const USER_METADATA_LENGTH: usize = 2;

/// Frozen bit in the first user metadata byte
const METADATA_FROZEN: u8 = 0x01;

/// Instance blob stored under a token key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub value: BigUint,
    pub token_type: u32,
    /// User metadata flags
    pub properties: Vec<u8>,
    pub metadata: Option<TokenMetadata>,
}

impl StoredToken {
    /// Whether the frozen flag is set in the user metadata
    pub fn is_frozen(&self) -> bool {
        self.properties
            .first()
            .map(|flags| flags & METADATA_FROZEN != 0)
            .unwrap_or(false)
    }
}

/// Encode the per-instance user metadata flags
pub fn user_metadata_bytes(frozen: bool) -> Vec<u8> {
    let mut bytes = vec![0u8; USER_METADATA_LENGTH];
    if frozen {
        bytes[0] |= METADATA_FROZEN;
    }
    bytes
}

/// One instance of a token held by an account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInstance {
    /// 0 (or unspecified) for the fungible instance
    pub nonce: Specified<Nonce>,
    pub balance: BigUint,
    pub creator: Vec<u8>,
    pub royalties: u32,
    pub hash: Vec<u8>,
    pub uris: Vec<Vec<u8>>,
    pub attributes: Vec<u8>,
}

impl TokenInstance {
    /// Fungible instance with an unspecified nonce
    pub fn fungible(balance: impl Into<BigUint>) -> Self {
        Self {
            balance: balance.into(),
            ..Self::default()
        }
    }

    /// Instance with an explicit nonce
    pub fn with_nonce(nonce: Nonce, balance: impl Into<BigUint>) -> Self {
        Self {
            nonce: Specified::Explicit(nonce),
            balance: balance.into(),
            ..Self::default()
        }
    }

    /// Resolved nonce
    pub fn nonce(&self) -> Nonce {
        self.nonce.value()
    }

    pub fn is_fungible(&self) -> bool {
        self.nonce() == 0
    }

    /// Metadata blob for this instance
    pub fn metadata(&self) -> TokenMetadata {
        TokenMetadata {
            name: Vec::new(),
            nonce: self.nonce(),
            creator: self.creator.clone(),
            royalties: self.royalties,
            hash: self.hash.clone(),
            uris: self.uris.clone(),
            attributes: self.attributes.clone(),
        }
    }

    /// Rebuild an instance from a stored blob
    pub fn from_stored(stored: &StoredToken, key_nonce: Nonce) -> Self {
        let nonce = stored
            .metadata
            .as_ref()
            .map(|m| m.nonce)
            .unwrap_or(key_nonce);
        let mut instance = Self {
            nonce: if nonce == 0 {
                Specified::Default
            } else {
                Specified::Explicit(nonce)
            },
            balance: stored.value.clone(),
            ..Self::default()
        };
        if let Some(metadata) = &stored.metadata {
            instance.creator = metadata.creator.clone();
            instance.royalties = metadata.royalties;
            instance.hash = metadata.hash.clone();
            instance.uris = metadata.uris.clone();
            instance.attributes = metadata.attributes.clone();
        }
        instance
    }
}

/// All instances of one token held by an account, with roles and counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub identifier: Vec<u8>,
    pub instances: Vec<TokenInstance>,
    /// Highest minted nonce
    pub last_nonce: Specified<u64>,
    pub roles: Specified<Vec<String>>,
    pub frozen: Specified<bool>,
}

impl TokenRecord {
    /// Empty record
    pub fn new(identifier: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Record holding a single fungible balance
    pub fn fungible(identifier: impl Into<Vec<u8>>, balance: impl Into<BigUint>) -> Self {
        Self::new(identifier).with_instance(TokenInstance::fungible(balance))
    }

    pub fn with_instance(mut self, instance: TokenInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_roles(mut self, roles: &[&str]) -> Self {
        self.roles = Specified::Explicit(roles.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn with_last_nonce(mut self, last_nonce: u64) -> Self {
        self.last_nonce = Specified::Explicit(last_nonce);
        self
    }

    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = Specified::Explicit(frozen);
        self
    }

    /// Identifier as text, for display and sorting in dumps
    pub fn identifier_str(&self) -> String {
        String::from_utf8_lossy(&self.identifier).into_owned()
    }

    /// Instance by nonce
    pub fn instance(&self, nonce: Nonce) -> Option<&TokenInstance> {
        self.instances.iter().find(|i| i.nonce() == nonce)
    }

    /// Whether the record collapses to a bare balance.
    ///
    /// Exactly one fungible instance, no roles and no frozen flag. The
    /// last nonce and instance metadata do not take part in the decision.
    pub fn is_compact(&self) -> bool {
        if self.instances.len() != 1 {
            return false;
        }
        if !self.instances[0].is_fungible() {
            return false;
        }
        let has_roles = self.roles.explicit().map(|r| !r.is_empty()).unwrap_or(false);
        !has_roles && !self.frozen.is_specified()
    }
}

/// Representation of a token record at the serialization boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenEntry {
    /// Bare balance of a lone fungible instance
    Compact(BigUint),
    /// Full structured form
    Full(TokenRecord),
}

impl TokenEntry {
    /// Apply the compaction rule
    pub fn from_record(record: &TokenRecord) -> Self {
        if record.is_compact() {
            TokenEntry::Compact(record.instances[0].balance.clone())
        } else {
            TokenEntry::Full(record.clone())
        }
    }

    /// Expand back into a record
    pub fn into_record(self, identifier: &[u8]) -> TokenRecord {
        match self {
            TokenEntry::Compact(balance) => TokenRecord::fungible(identifier.to_vec(), balance),
            TokenEntry::Full(record) => record,
        }
    }
}
