//! Thin, safe-at-the-edges wrapper around libsodium's AEAD primitive. Used to seal the private
//! portion of session/device tokens the way the original platform's connection tokens were
//! sealed, and to source cryptographically secure random bytes for token generation.

use byteorder::{LittleEndian, WriteBytesExt};
use ctor::ctor;

pub const MAC_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_ABYTES as usize;
pub const KEY_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_KEYBYTES as usize;
pub const NONCE_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_NPUBBYTES as usize;

const NONCE_OFFSET: usize = NONCE_SIZE - 8;

/// Initializes the sodium library once, before `main` runs.
#[ctor]
fn init_sodium() {
    unsafe {
        if libsodium_sys::sodium_init() < 0 {
            panic!("cryptography initialization failed");
        }
    }
}

#[inline]
fn nonce_to_bytes(nonce: u64) -> [u8; NONCE_SIZE] {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    (&mut nonce_bytes[NONCE_OFFSET..])
        .write_u64::<LittleEndian>(nonce)
        .expect("nonce buffer too small");
    nonce_bytes
}

/// Encrypts `plain` into `cipher`. `cipher` must be exactly `plain.len() + MAC_SIZE` bytes.
/// `additional_data`, `nonce` and `key` must match those passed to `decrypt` or the message will
/// fail to authenticate.
#[inline]
pub fn encrypt(cipher: &mut [u8], plain: &[u8], additional_data: &[u8], nonce: u64, key: &[u8; KEY_SIZE]) -> bool {
    assert_eq!(
        cipher.len(),
        plain.len() + MAC_SIZE,
        "cipher length must be plain length + MAC size"
    );

    let nonce_bytes = nonce_to_bytes(nonce);

    unsafe {
        let result = libsodium_sys::crypto_aead_chacha20poly1305_ietf_encrypt(
            cipher.as_mut_ptr(),
            std::ptr::null_mut(),
            plain.as_ptr(),
            plain.len() as u64,
            additional_data.as_ptr(),
            additional_data.len() as u64,
            std::ptr::null(),
            nonce_bytes.as_ptr(),
            key.as_ptr(),
        );

        result >= 0
    }
}

/// Decrypts `cipher` into `plain`. Returns `false` if the message fails to authenticate; `plain`
/// is left untouched in that case (the caller must not trust partially written output).
#[inline]
pub fn decrypt(plain: &mut [u8], cipher: &[u8], additional_data: &[u8], nonce: u64, key: &[u8; KEY_SIZE]) -> bool {
    assert_eq!(
        cipher.len(),
        plain.len() + MAC_SIZE,
        "cipher length must be plain length + MAC size"
    );

    let nonce_bytes = nonce_to_bytes(nonce);

    unsafe {
        let result = libsodium_sys::crypto_aead_chacha20poly1305_ietf_decrypt(
            plain.as_mut_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            cipher.as_ptr(),
            cipher.len() as u64,
            additional_data.as_ptr(),
            additional_data.len() as u64,
            nonce_bytes.as_ptr(),
            key.as_ptr(),
        );

        result >= 0
    }
}

/// Fills `out` with cryptographically secure random bytes.
#[inline]
pub fn random_bytes(out: &mut [u8]) {
    unsafe {
        libsodium_sys::randombytes_buf(out.as_mut_ptr() as *mut std::ffi::c_void, out.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut key = [0u8; KEY_SIZE];
        random_bytes(&mut key);

        let plain = b"on_radar=5;in_sight=5;on_map=5";
        let aad = b"session-token-context";

        let mut cipher = vec![0u8; plain.len() + MAC_SIZE];
        assert!(encrypt(&mut cipher, plain, aad, 42, &key));

        let mut decoded = vec![0u8; plain.len()];
        assert!(decrypt(&mut decoded, &cipher, aad, 42, &key));
        assert_eq!(&decoded[..], &plain[..]);
    }

    #[test]
    fn wrong_nonce_fails_to_authenticate() {
        let mut key = [0u8; KEY_SIZE];
        random_bytes(&mut key);

        let plain = b"payload";
        let aad = b"aad";

        let mut cipher = vec![0u8; plain.len() + MAC_SIZE];
        assert!(encrypt(&mut cipher, plain, aad, 1, &key));

        let mut decoded = vec![0u8; plain.len()];
        assert!(!decrypt(&mut decoded, &cipher, aad, 2, &key));
    }
}
