use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use md5::{Digest, Md5};
use serde_json::Value;

use super::error::ResolveError;

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const SALT_HEADER: &[u8] = b"Salted__";
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Base64 OpenSSL container: optional `Salted__` + 8-byte salt, then ciphertext.
struct SaltedBlob {
    salt: Option<Vec<u8>>,
    ciphertext: Vec<u8>,
}

impl SaltedBlob {
    fn parse(encoded: &str) -> Option<Self> {
        let data = STANDARD.decode(encoded.trim()).ok()?;
        if data.len() >= 16 && data.starts_with(SALT_HEADER) {
            Some(Self {
                salt: Some(data[8..16].to_vec()),
                ciphertext: data[16..].to_vec(),
            })
        } else {
            Some(Self {
                salt: None,
                ciphertext: data,
            })
        }
    }
}

/// OpenSSL `EVP_BytesToKey` with MD5 and one iteration.
pub fn evp_bytes_to_key(passphrase: &[u8], salt: Option<&[u8]>) -> ([u8; KEY_LEN], [u8; IV_LEN]) {
    let mut derived = Vec::with_capacity(KEY_LEN + IV_LEN + 16);
    let mut block: Vec<u8> = Vec::new();

    while derived.len() < KEY_LEN + IV_LEN {
        let mut hasher = Md5::new();
        hasher.update(&block);
        hasher.update(passphrase);
        if let Some(salt) = salt {
            hasher.update(salt);
        }
        block = hasher.finalize().to_vec();
        derived.extend_from_slice(&block);
    }

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&derived[..KEY_LEN]);
    iv.copy_from_slice(&derived[KEY_LEN..KEY_LEN + IV_LEN]);
    (key, iv)
}

fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Option<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return None;
    }

    let mut buf = ciphertext.to_vec();
    let plain = match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .ok()?
            .to_vec(),
        24 => Aes192CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .ok()?
            .to_vec(),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .ok()?
            .to_vec(),
        _ => return None,
    };
    Some(plain)
}

/// Key used as a passphrase: AES-256 key and IV come from `EVP_BytesToKey`.
pub fn decrypt_with_passphrase(encoded: &str, passphrase: &str) -> Option<String> {
    let blob = SaltedBlob::parse(encoded)?;
    let (key, iv) = evp_bytes_to_key(passphrase.as_bytes(), blob.salt.as_deref());
    let plain = cbc_decrypt(&key, &iv, &blob.ciphertext)?;
    String::from_utf8(plain).ok().filter(|s| !s.is_empty())
}

/// Key used as raw AES key bytes with a zero IV; any salt header is skipped.
pub fn decrypt_with_raw_key(encoded: &str, key: &[u8]) -> Option<String> {
    let blob = SaltedBlob::parse(encoded)?;
    let plain = cbc_decrypt(key, &[0u8; IV_LEN], &blob.ciphertext)?;
    String::from_utf8(plain).ok().filter(|s| !s.is_empty())
}

/// Decrypts an encrypted `sources` string into the source list, trying the
/// key as a passphrase first and as hex-encoded key bytes second.
pub fn decrypt_sources(encoded: &str, key: &str) -> Result<Vec<Value>, ResolveError> {
    let parse = |plain: String| serde_json::from_str::<Vec<Value>>(&plain).ok();

    decrypt_with_passphrase(encoded, key)
        .and_then(parse)
        .or_else(|| {
            hex::decode(key.trim())
                .ok()
                .and_then(|raw| decrypt_with_raw_key(encoded, &raw))
                .and_then(parse)
        })
        .ok_or(ResolveError::DecryptionFailed)
}
