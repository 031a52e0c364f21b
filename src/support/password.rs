use itertools::Itertools;
use rand::Rng;
use sha3::{Digest, Sha3_256};
use subtle::ConstantTimeEq;

const SCHEME: &str = "sha3";

/// Digest rounds for new hashes. Stored hashes carry their own count.
pub const ROUNDS: u32 = 20_000;

pub fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| format!("{:02x}", rng.gen::<u8>())).join("")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).join("")
}

fn digest(salt: &str, password: &str, rounds: u32) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    let mut state = hasher.finalize();

    for _ in 1..rounds {
        let mut hasher = Sha3_256::new();
        hasher.update(state);
        hasher.update(password.as_bytes());
        state = hasher.finalize();
    }

    hex(&state)
}

/// Produces `sha3$<rounds>$<salt>$<digest>` with a fresh 16-byte salt.
pub fn hash_password(password: &str) -> String {
    hash_password_with(password, ROUNDS)
}

pub fn hash_password_with(password: &str, rounds: u32) -> String {
    let salt = random_hex(16);
    let hashed = digest(&salt, password, rounds);
    format!("{}${}${}${}", SCHEME, rounds, salt, hashed)
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let (scheme, rounds, salt, hashed) = match stored.split('$').collect_tuple() {
        None => return false,
        Some(v) => v,
    };

    let rounds = match rounds.parse::<u32>() {
        Ok(v) if scheme == SCHEME && v > 0 => v,
        _ => return false,
    };

    digest(salt, password, rounds).as_bytes().ct_eq(hashed.as_bytes()).into()
}
