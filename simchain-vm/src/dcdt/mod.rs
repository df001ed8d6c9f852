//! DCDT token storage
//!
//! Tokens live in ordinary account storage under protected keys. This
//! module knows the key layout, the stored blob format and how to turn
//! a storage map into structured token records and back.

pub mod codec;
pub mod keys;
pub mod marshal;
pub mod model;

pub use codec::TokenCodec;
pub use keys::{
    is_protected_key, last_nonce_key, roles_key, system_account_address, token_key,
    PROTECTED_KEY_PREFIX,
};
pub use marshal::{BincodeMarshaler, DataMarshaler, JsonMarshaler};
pub use model::{StoredToken, TokenEntry, TokenInstance, TokenRecord, MAX_ROYALTIES};
