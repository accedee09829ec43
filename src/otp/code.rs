//! One-time code generation.

use rand::{rngs::OsRng, Rng};
use regex::Regex;

pub const CODE_LENGTH: usize = 6;

/// True when `code` is exactly six ASCII digits.
#[must_use]
pub fn is_valid_code(code: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").is_ok_and(|regex| regex.is_match(code))
}

/// Generate a six digit code from the OS random source.
#[must_use]
pub fn generate_code() -> String {
    generate_code_with(&mut OsRng)
}

/// Draw one digit at a time; anything that is not six digits falls back to
/// a uniform pick from `100000..=999999`.
pub fn generate_code_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let candidate: String = (0..CODE_LENGTH)
        .filter_map(|_| char::from_digit(rng.gen_range(0..10), 10))
        .collect();

    if is_valid_code(&candidate) {
        candidate
    } else {
        fallback_code(rng)
    }
}

fn fallback_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000..=999_999_u32).to_string()
}
