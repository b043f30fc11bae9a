//! Classic VNC (DES) authentication.
//!
//! The server sends a 16-byte challenge; the client encrypts it with
//! DES-ECB under a key derived from the password and returns the 16-byte
//! result. The key schedule has a historical quirk: the bit order within
//! each password byte is reversed. This is required by the RFB
//! specification and is not optional for interoperability.
//!
//! DES is obsolete as cryptography; it survives here purely because the
//! protocol demands it. The cipher comes from the RustCrypto `des` crate -
//! there is no fallback implementation, so a wrong-bytes handshake cannot
//! happen silently.

use des::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use des::Des;

/// Derive the 8-byte DES key from a VNC password.
///
/// The password is latin-1 encoded, truncated to 8 bytes, zero-padded on
/// the right, and each byte has its bit order reversed.
pub fn des_key_from_password(password: &str) -> [u8; 8] {
    let mut key = [0u8; 8];
    for (slot, c) in key.iter_mut().zip(password.chars()) {
        // Characters above U+00FF cannot occur in a valid VNC password;
        // truncate to the low byte the way latin-1 encoding would.
        *slot = (c as u32 & 0xFF) as u8;
    }
    for byte in &mut key {
        *byte = byte.reverse_bits();
    }
    key
}

/// Compute the 16-byte response to a 16-byte VNC auth challenge.
///
/// The two 8-byte halves of the challenge are encrypted independently with
/// DES-ECB and concatenated.
pub fn challenge_response(password: &str, challenge: &[u8; 16]) -> [u8; 16] {
    let key = des_key_from_password(password);
    let cipher = Des::new(GenericArray::from_slice(&key));

    let mut response = [0u8; 16];
    response.copy_from_slice(challenge);
    for half in response.chunks_exact_mut(8) {
        cipher.encrypt_block(GenericArray::from_mut_slice(half));
    }
    response
}
