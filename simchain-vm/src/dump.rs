//! Snapshot of the world in a stable, comparable form

use crate::dcdt::{is_protected_key, TokenEntry, TokenInstance, TokenRecord};
use crate::state::AccountStore;
use crate::VmResult;
use num_bigint::BigUint;
use serde_json::{json, Map, Value};
use simchain_core::Address;

/// One account as it appears in a world dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDump {
    pub address: Address,
    pub nonce: u64,
    pub balance: BigUint,
    pub owner: Option<Address>,
    pub code: Vec<u8>,
    pub code_metadata: Vec<u8>,
    /// Unprotected storage, sorted by key
    pub storage: Vec<(Vec<u8>, Vec<u8>)>,
    /// Tokens by identifier, compacted where possible
    pub tokens: Vec<(String, TokenEntry)>,
}

fn hex_bytes(bytes: &[u8]) -> Value {
    Value::String(format!("0x{}", hex::encode(bytes)))
}

fn instance_json(instance: &TokenInstance) -> Value {
    let mut fields = Map::new();
    fields.insert("nonce".into(), json!(instance.nonce()));
    fields.insert("balance".into(), json!(instance.balance.to_string()));
    if !instance.creator.is_empty() {
        fields.insert("creator".into(), hex_bytes(&instance.creator));
    }
    if instance.royalties != 0 {
        fields.insert("royalties".into(), json!(instance.royalties));
    }
    if !instance.hash.is_empty() {
        fields.insert("hash".into(), hex_bytes(&instance.hash));
    }
    if !instance.uris.is_empty() {
        let uris: Vec<Value> = instance.uris.iter().map(|uri| hex_bytes(uri)).collect();
        fields.insert("uris".into(), Value::Array(uris));
    }
    if !instance.attributes.is_empty() {
        fields.insert("attributes".into(), hex_bytes(&instance.attributes));
    }
    Value::Object(fields)
}

fn record_json(record: &TokenRecord) -> Value {
    let mut fields = Map::new();
    let instances: Vec<Value> = record.instances.iter().map(instance_json).collect();
    fields.insert("instances".into(), Value::Array(instances));
    if let Some(last_nonce) = record.last_nonce.explicit() {
        fields.insert("lastNonce".into(), json!(last_nonce));
    }
    if let Some(roles) = record.roles.explicit() {
        fields.insert("roles".into(), json!(roles));
    }
    if let Some(frozen) = record.frozen.explicit() {
        fields.insert("frozen".into(), json!(frozen));
    }
    Value::Object(fields)
}

impl AccountDump {
    /// JSON form; byte strings are `0x`-prefixed hex, amounts decimal strings
    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("nonce".into(), json!(self.nonce));
        fields.insert("balance".into(), json!(self.balance.to_string()));
        if let Some(owner) = &self.owner {
            fields.insert("owner".into(), hex_bytes(owner.as_bytes()));
        }
        if !self.code.is_empty() {
            fields.insert("code".into(), hex_bytes(&self.code));
            fields.insert("codeMetadata".into(), hex_bytes(&self.code_metadata));
        }
        if !self.storage.is_empty() {
            let storage: Map<String, Value> = self
                .storage
                .iter()
                .map(|(key, value)| (format!("0x{}", hex::encode(key)), hex_bytes(value)))
                .collect();
            fields.insert("storage".into(), Value::Object(storage));
        }
        if !self.tokens.is_empty() {
            let tokens: Map<String, Value> = self
                .tokens
                .iter()
                .map(|(identifier, entry)| {
                    let value = match entry {
                        TokenEntry::Compact(balance) => json!(balance.to_string()),
                        TokenEntry::Full(record) => record_json(record),
                    };
                    (identifier.clone(), value)
                })
                .collect();
            fields.insert("dcdt".into(), Value::Object(tokens));
        }
        Value::Object(fields)
    }
}

/// Dump every account of the store, sorted by address
pub fn dump_world(store: &AccountStore) -> VmResult<Vec<AccountDump>> {
    let mut dumps = Vec::with_capacity(store.len());

    for account in store.accounts() {
        let storage = account
            .storage
            .iter()
            .filter(|(key, value)| !is_protected_key(key) && !value.is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut tokens: Vec<(String, TokenEntry)> = store
            .token_records(&account.address)?
            .iter()
            .map(|record| (record.identifier_str(), TokenEntry::from_record(record)))
            .collect();
        tokens.sort_by(|a, b| a.0.cmp(&b.0));

        dumps.push(AccountDump {
            address: account.address.clone(),
            nonce: account.nonce,
            balance: account.balance.clone(),
            owner: account.owner.clone(),
            code: account.code.clone(),
            code_metadata: account.code_metadata.clone(),
            storage,
            tokens,
        });
    }

    Ok(dumps)
}

/// Pretty-printed JSON object keyed by hex address
pub fn world_to_json(dumps: &[AccountDump]) -> VmResult<String> {
    let accounts: Map<String, Value> = dumps
        .iter()
        .map(|dump| (format!("0x{}", dump.address.to_hex()), dump.to_json()))
        .collect();
    Ok(serde_json::to_string_pretty(&Value::Object(accounts))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountSeed;
    use crate::dcdt::{TokenInstance, TokenRecord};

    fn world() -> AccountStore {
        let mut store = AccountStore::new();
        store
            .seed_account(
                AccountSeed::new(Address::from_name("bob"), 7u32)
                    .with_storage(b"z".to_vec(), b"1".to_vec())
                    .with_storage(b"a".to_vec(), b"2".to_vec())
                    .with_storage(b"DHARITRIreward".to_vec(), vec![5])
                    .with_token(TokenRecord::fungible(b"TEST-abcdef".to_vec(), 50u32))
                    .with_token(
                        TokenRecord::new(b"NFT-123456".to_vec())
                            .with_instance(TokenInstance::with_nonce(1, 1u32))
                            .with_roles(&["DCDTRoleNFTCreate"]),
                    ),
            )
            .unwrap();
        store
            .seed_account(AccountSeed::new(Address::from_name("alice"), 1u32))
            .unwrap();
        store
    }

    #[test]
    fn test_dump_world_sorted() {
        let dumps = dump_world(&world()).unwrap();
        let addresses: Vec<Address> = dumps.iter().map(|d| d.address.clone()).collect();
        let mut sorted = addresses.clone();
        sorted.sort();
        assert_eq!(addresses, sorted);

        let bob = dumps
            .iter()
            .find(|d| d.address == Address::from_name("bob"))
            .unwrap();
        assert_eq!(
            bob.storage,
            vec![
                (b"a".to_vec(), b"2".to_vec()),
                (b"z".to_vec(), b"1".to_vec())
            ]
        );
        let identifiers: Vec<&str> = bob.tokens.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(identifiers, vec!["NFT-123456", "TEST-abcdef"]);
        assert_eq!(bob.tokens[1].1, TokenEntry::Compact(BigUint::from(50u32)));
        assert!(matches!(bob.tokens[0].1, TokenEntry::Full(_)));
    }

    #[test]
    fn test_json_shape() {
        let dumps = dump_world(&world()).unwrap();
        let bob = dumps
            .iter()
            .find(|d| d.address == Address::from_name("bob"))
            .unwrap();
        let value = bob.to_json();

        assert_eq!(value["balance"], json!("7"));
        assert_eq!(value["storage"]["0x61"], json!("0x32"));
        assert_eq!(value["dcdt"]["TEST-abcdef"], json!("50"));
        assert_eq!(value["dcdt"]["NFT-123456"]["roles"], json!(["DCDTRoleNFTCreate"]));
        assert_eq!(value["dcdt"]["NFT-123456"]["instances"][0]["nonce"], json!(1));
        assert!(value.get("code").is_none());

        let text = world_to_json(&dumps).unwrap();
        assert!(text.contains("TEST-abcdef"));
        assert!(!text.contains("reward"));
    }
}
