//! Sealed secrets for `config.yaml`
//!
//! Client secrets and refresh tokens can be stored as `encrypted:BASE64`
//! instead of plaintext. The AES-256-GCM key is derived from
//! `PMOSPOTIFY_SECRET_KEY` when set, otherwise from the machine id. A config
//! file sealed with the machine id is therefore not portable across hosts.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::env;

/// Préfixe pour identifier les secrets scellés
const SEALED_PREFIX: &str = "encrypted:";

const ENV_SECRET_KEY: &str = "PMOSPOTIFY_SECRET_KEY";
const KEY_SALT: &[u8] = b"pmospotify-config-encryption-v1";
const NONCE_SALT: &[u8] = b"pmospotify-nonce-v1";
const NONCE_LEN: usize = 12;

/// Reads the host identifier used as key material
///
/// Linux uses `/etc/machine-id` then `/var/lib/dbus/machine-id`, macOS the
/// `IOPlatformUUID` reported by `ioreg`.
fn get_machine_id() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        use std::fs;

        for candidate in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
            if let Ok(id) = fs::read_to_string(candidate) {
                let id = id.trim();
                if !id.is_empty() {
                    return Ok(id.to_string());
                }
            }
        }

        Err(anyhow!("Failed to read machine-id"))
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-d2", "-c", "IOPlatformExpertDevice"])
            .output()?;

        let output_str = String::from_utf8_lossy(&output.stdout);
        output_str
            .lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Failed to extract IOPlatformUUID from ioreg"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Err(anyhow!(
            "No machine id on this platform, set {} instead",
            ENV_SECRET_KEY
        ))
    }
}

/// Derives a 256-bit key from arbitrary key material
pub fn derive_key_from(material: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    hasher.update(KEY_SALT);

    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Key used by [`seal_secret`] and [`open_secret`]
fn derive_key() -> Result<[u8; 32]> {
    match env::var(ENV_SECRET_KEY) {
        Ok(material) if !material.is_empty() => Ok(derive_key_from(&material)),
        _ => Ok(derive_key_from(&get_machine_id()?)),
    }
}

/// Seals `secret` with an explicit key
///
/// The nonce is derived from the key and the plaintext, so sealing the same
/// secret twice yields the same string and does not churn `config.yaml`.
/// Encoded layout: `nonce(12 bytes) + ciphertext`.
pub fn seal_with_key(key: &[u8; 32], secret: &str) -> Result<String> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let mut hasher = Sha256::new();
    hasher.update(key);
    hasher.update(secret.as_bytes());
    hasher.update(NONCE_SALT);
    let nonce_hash = hasher.finalize();
    let nonce_bytes = &nonce_hash[..NONCE_LEN];

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce_bytes), secret.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!(
        "{}{}",
        SEALED_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(&combined)
    ))
}

/// Opens a value produced by [`seal_with_key`]
pub fn open_with_key(key: &[u8; 32], sealed: &str) -> Result<String> {
    let base64_data = sealed
        .strip_prefix(SEALED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid sealed secret format (missing prefix)"))?;

    let combined = base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;

    if combined.len() <= NONCE_LEN {
        return Err(anyhow!("Invalid sealed secret (too short)"));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// Seals `secret` with the host key
///
/// ```rust,ignore
/// let sealed = seal_secret("my_refresh_token")?;
/// // sealed = "encrypted:SGVsbG8gV29ybGQh..."
/// ```
pub fn seal_secret(secret: &str) -> Result<String> {
    seal_with_key(&derive_key()?, secret)
}

/// Opens a sealed secret with the host key
pub fn open_secret(sealed: &str) -> Result<String> {
    open_with_key(&derive_key()?, sealed)
}

/// `true` if the value carries the `encrypted:` prefix
pub fn is_sealed(value: &str) -> bool {
    value.starts_with(SEALED_PREFIX)
}

/// Returns the plaintext of `value`, opening it first when sealed
pub fn get_secret(value: &str) -> Result<String> {
    if is_sealed(value) {
        open_secret(value)
    } else {
        Ok(value.to_string())
    }
}
