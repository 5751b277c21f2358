//! Single-use backup codes.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::types::BackupCode;

const CODE_COUNT: usize = 10;
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

/// Generate a fresh set of 10 plaintext codes plus their persisted
/// hashed form. The plaintext is returned once and must not be stored.
pub fn generate() -> (Vec<String>, Vec<BackupCode>) {
    let mut rng = rand::thread_rng();
    let mut plaintext = Vec::with_capacity(CODE_COUNT);
    let mut hashed = Vec::with_capacity(CODE_COUNT);

    for _ in 0..CODE_COUNT {
        let code: String = (0..10)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        hashed.push(BackupCode {
            code_hash: hash_code(&code),
            used: false,
            used_at: None,
        });
        plaintext.push(code);
    }

    (plaintext, hashed)
}

/// Attempt to consume `code` against the stored set. Flips `used` on
/// the first unused match and returns true; a reused or unknown code
/// returns false without mutating state.
pub fn consume(codes: &mut [BackupCode], code: &str) -> bool {
    let target = hash_code(code);
    for entry in codes.iter_mut() {
        if entry.code_hash == target && !entry.used {
            entry.used = true;
            entry.used_at = Some(chrono::Utc::now());
            return true;
        }
    }
    false
}
