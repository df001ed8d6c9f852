//! Storage key layout for DCDT data

use simchain_core::{u64_from_bytes, u64_to_bytes, Address};

/// Prefix of every storage key reserved for the protocol
pub const PROTECTED_KEY_PREFIX: &[u8] = b"DHARITRI";

/// Prefix of token instance keys
pub const TOKEN_KEY_PREFIX: &[u8] = b"DHARITRIdcdt";

/// Prefix of token role keys
pub const ROLES_KEY_PREFIX: &[u8] = b"DHARITRIroledcdt";

/// Prefix of last-minted-nonce keys
pub const LAST_NONCE_KEY_PREFIX: &[u8] = b"DHARITRInonce";

/// Separator between ticker and random sequence in an identifier
pub const IDENTIFIER_SEPARATOR: u8 = b'-';

/// Length of the random sequence after the separator
pub const RANDOM_SEQUENCE_LENGTH: usize = 6;

/// Address of the account holding shared instance metadata
pub fn system_account_address() -> Address {
    Address::new(vec![0xFF; 32])
}

/// `TOKEN_KEY_PREFIX ‖ identifier ‖ minimal big-endian nonce`
pub fn token_key(identifier: &[u8], nonce: u64) -> Vec<u8> {
    let mut key = TOKEN_KEY_PREFIX.to_vec();
    key.extend_from_slice(identifier);
    key.extend_from_slice(&u64_to_bytes(nonce));
    key
}

/// `ROLES_KEY_PREFIX ‖ identifier`
pub fn roles_key(identifier: &[u8]) -> Vec<u8> {
    let mut key = ROLES_KEY_PREFIX.to_vec();
    key.extend_from_slice(identifier);
    key
}

/// `LAST_NONCE_KEY_PREFIX ‖ identifier`
pub fn last_nonce_key(identifier: &[u8]) -> Vec<u8> {
    let mut key = LAST_NONCE_KEY_PREFIX.to_vec();
    key.extend_from_slice(identifier);
    key
}

pub fn is_token_key(key: &[u8]) -> bool {
    key.starts_with(TOKEN_KEY_PREFIX)
}

pub fn is_roles_key(key: &[u8]) -> bool {
    key.starts_with(ROLES_KEY_PREFIX)
}

pub fn is_last_nonce_key(key: &[u8]) -> bool {
    key.starts_with(LAST_NONCE_KEY_PREFIX)
}

pub fn is_protected_key(key: &[u8]) -> bool {
    key.starts_with(PROTECTED_KEY_PREFIX)
}

/// Split the suffix of a token key into identifier and nonce.
///
/// A suffix such as `TICKER-abcdef\x01` carries the nonce after the
/// six-byte random sequence. Suffixes with no separator, or whose second
/// segment is not longer than the random sequence, are fungible.
pub fn split_identifier_and_nonce(suffix: &[u8]) -> (Vec<u8>, u64) {
    let Some(pos) = suffix.iter().position(|b| *b == IDENTIFIER_SEPARATOR) else {
        return (suffix.to_vec(), 0);
    };

    let ticker = &suffix[..pos];
    let rest = &suffix[pos + 1..];
    if rest.len() <= RANDOM_SEQUENCE_LENGTH {
        return (suffix.to_vec(), 0);
    }

    let mut identifier = ticker.to_vec();
    identifier.push(IDENTIFIER_SEPARATOR);
    identifier.extend_from_slice(&rest[..RANDOM_SEQUENCE_LENGTH]);
    let nonce = u64_from_bytes(&rest[RANDOM_SEQUENCE_LENGTH..]);
    (identifier, nonce)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_key_layout() {
        assert_eq!(token_key(b"TEST-abcdef", 0), b"DHARITRIdcdtTEST-abcdef".to_vec());

        let key = token_key(b"NFT-123456", 0x0102);
        assert!(key.ends_with(&[0x01, 0x02]));
        assert!(is_token_key(&key));
        assert!(!is_roles_key(&key));
        assert!(!is_last_nonce_key(&key));
    }

    #[test]
    fn test_prefixes_are_disjoint() {
        assert!(is_roles_key(&roles_key(b"A-000000")));
        assert!(!is_token_key(&roles_key(b"A-000000")));
        assert!(is_last_nonce_key(&last_nonce_key(b"A-000000")));
        assert!(!is_token_key(&last_nonce_key(b"A-000000")));
        assert!(is_protected_key(&last_nonce_key(b"A-000000")));
    }

    #[test]
    fn test_split_fungible() {
        assert_eq!(
            split_identifier_and_nonce(b"TEST-abcdef"),
            (b"TEST-abcdef".to_vec(), 0)
        );
        assert_eq!(split_identifier_and_nonce(b"PLAIN"), (b"PLAIN".to_vec(), 0));
    }

    #[test]
    fn test_split_with_nonce() {
        let key = token_key(b"NFT-123456", 5);
        let suffix = &key[TOKEN_KEY_PREFIX.len()..];
        assert_eq!(split_identifier_and_nonce(suffix), (b"NFT-123456".to_vec(), 5));
    }

    #[test]
    fn test_split_nonce_containing_separator() {
        let key = token_key(b"NFT-123456", u64::from(IDENTIFIER_SEPARATOR));
        let suffix = &key[TOKEN_KEY_PREFIX.len()..];
        assert_eq!(
            split_identifier_and_nonce(suffix),
            (b"NFT-123456".to_vec(), u64::from(IDENTIFIER_SEPARATOR))
        );
    }
}
