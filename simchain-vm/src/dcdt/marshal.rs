//! Binary encodings for stored token data

use super::model::StoredToken;
use crate::VmResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoder/decoder for the blobs the token codec stores.
///
/// Passed explicitly to the codec so tests can swap encodings.
pub trait DataMarshaler: Send + Sync + fmt::Debug {
    /// Encode an instance blob
    fn marshal_token(&self, token: &StoredToken) -> VmResult<Vec<u8>>;

    /// Decode an instance blob
    fn unmarshal_token(&self, bytes: &[u8]) -> VmResult<StoredToken>;

    /// Encode a role list
    fn marshal_roles(&self, roles: &[Vec<u8>]) -> VmResult<Vec<u8>>;

    /// Decode a role list
    fn unmarshal_roles(&self, bytes: &[u8]) -> VmResult<Vec<Vec<u8>>>;
}

#[derive(Serialize, Deserialize)]
struct StoredRoles {
    roles: Vec<Vec<u8>>,
}

/// Compact binary encoding (bincode)
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeMarshaler;

impl DataMarshaler for BincodeMarshaler {
    fn marshal_token(&self, token: &StoredToken) -> VmResult<Vec<u8>> {
        Ok(bincode::serialize(token)?)
    }

    fn unmarshal_token(&self, bytes: &[u8]) -> VmResult<StoredToken> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn marshal_roles(&self, roles: &[Vec<u8>]) -> VmResult<Vec<u8>> {
        Ok(bincode::serialize(&StoredRoles {
            roles: roles.to_vec(),
        })?)
    }

    fn unmarshal_roles(&self, bytes: &[u8]) -> VmResult<Vec<Vec<u8>>> {
        let stored: StoredRoles = bincode::deserialize(bytes)?;
        Ok(stored.roles)
    }
}

/// Human-readable encoding, handy when inspecting raw storage
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaler;

impl DataMarshaler for JsonMarshaler {
    fn marshal_token(&self, token: &StoredToken) -> VmResult<Vec<u8>> {
        Ok(serde_json::to_vec(token)?)
    }

    fn unmarshal_token(&self, bytes: &[u8]) -> VmResult<StoredToken> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn marshal_roles(&self, roles: &[Vec<u8>]) -> VmResult<Vec<u8>> {
        Ok(serde_json::to_vec(&StoredRoles {
            roles: roles.to_vec(),
        })?)
    }

    fn unmarshal_roles(&self, bytes: &[u8]) -> VmResult<Vec<Vec<u8>>> {
        let stored: StoredRoles = serde_json::from_slice(bytes)?;
        Ok(stored.roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;
    use simchain_core::TokenMetadata;

    fn sample() -> StoredToken {
        StoredToken {
            value: BigUint::from(123_456u32),
            token_type: 1,
            properties: vec![1, 0],
            metadata: Some(TokenMetadata {
                nonce: 4,
                royalties: 250,
                uris: vec![b"https://example.org/4".to_vec()],
                ..TokenMetadata::default()
            }),
        }
    }

    #[test]
    fn test_bincode_token() {
        let m = BincodeMarshaler;
        let bytes = m.marshal_token(&sample()).unwrap();
        assert_eq!(m.unmarshal_token(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_json_roles() {
        let m = JsonMarshaler;
        let roles = vec![b"DCDTRoleNFTCreate".to_vec()];
        let bytes = m.marshal_roles(&roles).unwrap();
        assert_eq!(m.unmarshal_roles(&bytes).unwrap(), roles);
    }

    #[test]
    fn test_empty_roles_are_not_empty_bytes() {
        // an explicitly empty role list must survive storage pruning
        let bytes = BincodeMarshaler.marshal_roles(&[]).unwrap();
        assert!(!bytes.is_empty());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(BincodeMarshaler.unmarshal_token(&[0xff]).is_err());
        assert!(JsonMarshaler.unmarshal_roles(b"not json").is_err());
    }
}
