//! Fuzz testing for validation functions.
//!
//! Validation runs on untrusted form input before anything else touches it,
//! so it must never panic, whatever bytes arrive.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;
use portico::validation::{normalize_email, validate_email, validate_name, validate_password};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = validate_email(s);
        let _ = validate_email(&normalize_email(s));
        let _ = validate_password(s);
        let _ = validate_name(s, "First name");
    }
});
