//! Conversion between flat account storage and token records

use super::keys::{
    is_last_nonce_key, is_roles_key, is_token_key, last_nonce_key, roles_key,
    split_identifier_and_nonce, token_key, LAST_NONCE_KEY_PREFIX, ROLES_KEY_PREFIX,
    TOKEN_KEY_PREFIX,
};
use super::marshal::{BincodeMarshaler, DataMarshaler};
use super::model::{user_metadata_bytes, StoredToken, TokenInstance, TokenRecord, MAX_ROYALTIES};
use crate::account::Storage;
use crate::{VmError, VmResult};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use simchain_core::{u64_from_bytes, u64_to_bytes, DcdtTokenKind, Nonce, Specified, TokenDelta};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// Reads and writes DCDT data in an account's storage map.
///
/// Holds no ledger state; every call works on the map it is given.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    marshaler: Arc<dyn DataMarshaler>,
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(Arc::new(BincodeMarshaler))
    }
}

impl TokenCodec {
    /// Create a codec with the given marshaler
    pub fn new(marshaler: Arc<dyn DataMarshaler>) -> Self {
        Self { marshaler }
    }

    /// Marshaler in use
    pub fn marshaler(&self) -> &Arc<dyn DataMarshaler> {
        &self.marshaler
    }

    fn read_stored(&self, storage: &Storage, key: &[u8]) -> VmResult<Option<StoredToken>> {
        match storage.get(key) {
            Some(bytes) if !bytes.is_empty() => Ok(Some(self.marshaler.unmarshal_token(bytes)?)),
            _ => Ok(None),
        }
    }

    fn token_data_by_key(
        &self,
        key: &[u8],
        storage: &Storage,
        system_storage: Option<&Storage>,
    ) -> VmResult<StoredToken> {
        let Some(mut token) = self.read_stored(storage, key)? else {
            return Ok(StoredToken::default());
        };

        if let Some(system_storage) = system_storage {
            if let Some(shared) = self.read_stored(system_storage, key)? {
                token.metadata = shared.metadata;
            }
        }
        Ok(token)
    }

    /// Instance blob for a token, with metadata taken from the system
    /// account when it holds an entry under the same key.
    pub fn token_data(
        &self,
        identifier: &[u8],
        nonce: Nonce,
        storage: &Storage,
        system_storage: Option<&Storage>,
    ) -> VmResult<StoredToken> {
        self.token_data_by_key(&token_key(identifier, nonce), storage, system_storage)
    }

    /// Balance of a token instance; zero if absent
    pub fn token_balance(&self, identifier: &[u8], nonce: Nonce, storage: &Storage) -> VmResult<BigUint> {
        Ok(self.token_data(identifier, nonce, storage, None)?.value)
    }

    /// Store an instance blob
    pub fn set_token_data(
        &self,
        identifier: &[u8],
        nonce: Nonce,
        token: &StoredToken,
        storage: &mut Storage,
    ) -> VmResult<()> {
        if let Some(metadata) = &token.metadata {
            if metadata.royalties > MAX_ROYALTIES {
                return Err(VmError::InvalidRoyalties(metadata.royalties));
            }
        }
        let bytes = self.marshaler.marshal_token(token)?;
        put(storage, token_key(identifier, nonce), bytes);
        Ok(())
    }

    /// Overwrite the balance of an instance, keeping its other fields
    pub fn set_token_balance(
        &self,
        identifier: &[u8],
        nonce: Nonce,
        balance: &BigInt,
        storage: &mut Storage,
    ) -> VmResult<()> {
        let (sign, magnitude) = balance.clone().into_parts();
        if sign == Sign::Minus {
            return Err(VmError::NegativeValue);
        }
        let mut token = self.token_data(identifier, nonce, storage, None)?;
        token.value = magnitude;
        self.set_token_data(identifier, nonce, &token, storage)
    }

    /// Add a signed amount to an instance balance.
    ///
    /// A freshly created non-fungible instance takes the metadata carried by
    /// the delta. An instance brought down to zero is removed.
    pub fn apply_token_delta(&self, delta: &TokenDelta, storage: &mut Storage) -> VmResult<()> {
        let mut token = self.token_data(&delta.token_identifier, delta.nonce, storage, None)?;
        let updated = BigInt::from_biguint(Sign::Plus, token.value.clone()) + &delta.delta;
        let (sign, magnitude) = updated.into_parts();
        if sign == Sign::Minus {
            return Err(VmError::NegativeValue);
        }

        if magnitude.is_zero() {
            storage.remove(&token_key(&delta.token_identifier, delta.nonce));
            return Ok(());
        }

        token.value = magnitude;
        token.token_type = DcdtTokenKind::from_nonce(delta.nonce).as_u32();
        if token.properties.is_empty() {
            token.properties = user_metadata_bytes(false);
        }
        if token.metadata.is_none() {
            token.metadata = delta.metadata.clone();
        }
        trace!(
            token = %String::from_utf8_lossy(&delta.token_identifier),
            nonce = delta.nonce,
            balance = %token.value,
            "applied token delta"
        );
        self.set_token_data(&delta.token_identifier, delta.nonce, &token, storage)
    }

    /// Roles held for a token; empty if none were written
    pub fn token_roles(&self, identifier: &[u8], storage: &Storage) -> VmResult<Vec<Vec<u8>>> {
        match storage.get(&roles_key(identifier)) {
            Some(bytes) if !bytes.is_empty() => self.marshaler.unmarshal_roles(bytes),
            _ => Ok(Vec::new()),
        }
    }

    /// Write the role list for a token; an empty list is still written
    pub fn set_token_roles(&self, identifier: &[u8], roles: &[Vec<u8>], storage: &mut Storage) -> VmResult<()> {
        let bytes = self.marshaler.marshal_roles(roles)?;
        put(storage, roles_key(identifier), bytes);
        Ok(())
    }

    /// Last minted nonce; zero if absent
    pub fn last_nonce(&self, identifier: &[u8], storage: &Storage) -> u64 {
        storage
            .get(&last_nonce_key(identifier))
            .map(|bytes| u64_from_bytes(bytes))
            .unwrap_or(0)
    }

    /// Write the last minted nonce; zero removes the entry
    pub fn set_last_nonce(&self, identifier: &[u8], last_nonce: u64, storage: &mut Storage) {
        put(storage, last_nonce_key(identifier), u64_to_bytes(last_nonce));
    }

    /// Serialize token records into storage.
    ///
    /// One entry per instance, a roles entry when roles were given, and a
    /// last-nonce entry (pruned when zero).
    pub fn write_records(&self, records: &[TokenRecord], storage: &mut Storage) -> VmResult<()> {
        for record in records {
            let frozen = record.frozen.value();
            for instance in &record.instances {
                if instance.royalties > MAX_ROYALTIES {
                    return Err(VmError::InvalidRoyalties(instance.royalties));
                }
                let nonce = instance.nonce();
                let token = StoredToken {
                    value: instance.balance.clone(),
                    token_type: DcdtTokenKind::from_nonce(nonce).as_u32(),
                    properties: user_metadata_bytes(frozen),
                    metadata: Some(instance.metadata()),
                };
                self.set_token_data(&record.identifier, nonce, &token, storage)?;
            }

            self.set_last_nonce(&record.identifier, record.last_nonce.value(), storage);

            if let Some(roles) = resolved_roles(&record.roles) {
                let roles: Vec<Vec<u8>> = roles.iter().map(|r| r.as_bytes().to_vec()).collect();
                self.set_token_roles(&record.identifier, &roles, storage)?;
            }
        }
        Ok(())
    }

    /// Decode every token record held in storage.
    ///
    /// Instances with a zero balance are left out. Records come back sorted
    /// by identifier, instances by nonce.
    pub fn read_records(
        &self,
        storage: &Storage,
        system_storage: Option<&Storage>,
    ) -> VmResult<Vec<TokenRecord>> {
        let mut records: BTreeMap<Vec<u8>, TokenRecord> = BTreeMap::new();

        for (key, value) in storage {
            if is_token_key(key) {
                let token = self.token_data_by_key(key, storage, system_storage)?;
                if token.value.is_zero() {
                    continue;
                }
                let (identifier, key_nonce) =
                    split_identifier_and_nonce(&key[TOKEN_KEY_PREFIX.len()..]);
                let frozen = token.is_frozen();
                let record = record_entry(&mut records, identifier);
                record.instances.push(TokenInstance::from_stored(&token, key_nonce));
                if frozen {
                    record.frozen = Specified::Explicit(true);
                }
            } else if is_last_nonce_key(key) {
                let identifier = key[LAST_NONCE_KEY_PREFIX.len()..].to_vec();
                record_entry(&mut records, identifier).last_nonce =
                    Specified::Explicit(u64_from_bytes(value));
            } else if is_roles_key(key) {
                let identifier = key[ROLES_KEY_PREFIX.len()..].to_vec();
                let roles = self
                    .token_roles(&identifier, storage)?
                    .into_iter()
                    .map(|r| String::from_utf8_lossy(&r).into_owned())
                    .collect();
                record_entry(&mut records, identifier).roles = Specified::Explicit(roles);
            }
        }

        let mut records: Vec<TokenRecord> = records.into_values().collect();
        for record in &mut records {
            record.instances.sort_by_key(|i| i.nonce());
        }
        Ok(records)
    }
}

fn record_entry(records: &mut BTreeMap<Vec<u8>, TokenRecord>, identifier: Vec<u8>) -> &mut TokenRecord {
    records
        .entry(identifier.clone())
        .or_insert_with(|| TokenRecord::new(identifier))
}

fn resolved_roles(roles: &Specified<Vec<String>>) -> Option<Vec<String>> {
    match roles {
        Specified::Unspecified => None,
        Specified::Default => Some(Vec::new()),
        Specified::Explicit(roles) => Some(roles.clone()),
    }
}

fn put(storage: &mut Storage, key: Vec<u8>, value: Vec<u8>) {
    if value.is_empty() {
        storage.remove(&key);
    } else {
        storage.insert(key, value);
    }
}
