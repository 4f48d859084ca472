//! User-supplied API key storage.
//!
//! The key is XOR-obfuscated against a fixed salt and base64-encoded before
//! it lands in the key/value store. This is obfuscation, not encryption —
//! it keeps the key out of casual plain-text reads of the storage medium.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::stores::KvStore;

const KEY_STORAGE_KEY: &str = "safesubmit_user_api_key";
const OBFUSCATION_SALT: &[u8] = b"SafeSubmit_Secret_Salt";

fn xor_with_salt(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ OBFUSCATION_SALT[i % OBFUSCATION_SALT.len()])
        .collect()
}

pub fn obfuscate(key: &str) -> String {
    STANDARD.encode(xor_with_salt(key.as_bytes()))
}

pub fn deobfuscate(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded).ok()?;
    String::from_utf8(xor_with_salt(&bytes)).ok()
}

pub async fn save_user_key(store: &dyn KvStore, key: &str) -> anyhow::Result<()> {
    if key.is_empty() {
        return Ok(());
    }
    store.set(KEY_STORAGE_KEY, &obfuscate(key)).await
}

/// The stored user key, if one exists and decodes cleanly.
pub async fn load_user_key(store: &dyn KvStore) -> Option<String> {
    let stored = store.get(KEY_STORAGE_KEY).await.ok().flatten()?;
    deobfuscate(&stored).filter(|key| !key.is_empty())
}

pub async fn clear_user_key(store: &dyn KvStore) -> anyhow::Result<()> {
    store.remove(KEY_STORAGE_KEY).await
}
