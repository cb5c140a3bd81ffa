use anyhow::anyhow;
use rand::Rng;

use super::{CliResult, Failure};

/// Largest key `hexkey` will generate, in bytes.
pub const MAX_KEY_LEN: usize = 4096;

/// `length` random bytes, hex encoded.
pub fn generate_hex_key(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill(bytes.as_mut_slice());
    hex::encode(bytes)
}

pub(super) fn print_hex_key(length: usize) -> CliResult {
    if !(1..=MAX_KEY_LEN).contains(&length) {
        return Err(Failure::new(
            exitcode::USAGE,
            anyhow!("--length must be between 1 and {MAX_KEY_LEN}"),
        ));
    }
    println!("{}", generate_hex_key(length));
    Ok(())
}
