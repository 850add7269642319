// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random identifiers drawn from the system CSPRNG.

use ring::rand::{SecureRandom, SystemRandom};

use crate::error::AppError;

const DOCUMENT_ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const DOCUMENT_ID_LENGTH: usize = 20;

/// Draw `len` characters uniformly from `alphabet`.
///
/// Bytes at or above the largest multiple of the alphabet size are discarded
/// so every character is equally likely.
pub fn random_string(rng: &SystemRandom, alphabet: &[u8], len: usize) -> Result<String, AppError> {
    debug_assert!(!alphabet.is_empty() && alphabet.len() <= 256);
    let limit = 256 - (256 % alphabet.len());

    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 32];
    while out.len() < len {
        rng.fill(&mut buf)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        for &b in buf.iter().filter(|&&b| (b as usize) < limit) {
            if out.len() == len {
                break;
            }
            out.push(alphabet[b as usize % alphabet.len()] as char);
        }
    }
    Ok(out)
}

/// New document ID in the same shape as Firestore auto IDs.
pub fn new_document_id() -> Result<String, AppError> {
    random_string(&SystemRandom::new(), DOCUMENT_ID_ALPHABET, DOCUMENT_ID_LENGTH)
}
