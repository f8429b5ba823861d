//! Accounts, credential digests and session token generation.
//!
//! Passwords are never stored or logged in the clear: an account keeps a
//! SHA-256 digest of `salt || password` next to its random salt, both
//! hex-encoded.

use crate::UserId;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of session tokens, in alphanumeric characters.
pub const TOKEN_LENGTH: usize = 32;

const SALT_LENGTH: usize = 16;

/// A registered account.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    /// Hex-encoded SHA-256 of `salt || password`.
    pub digest: String,
    /// Hex-encoded random salt.
    pub salt: String,
    pub email: String,
}

/// Digests a fresh password with a random salt.
///
/// Returns `(digest, salt)`, both hex-encoded.
pub fn hash_password(rng: &mut ChaCha20Rng, password: &str) -> (String, String) {
    let mut salt = [0u8; SALT_LENGTH];
    rng.fill_bytes(&mut salt);
    (digest_hex(&salt, password), hex::encode(salt))
}

/// Whether `password` matches the user's stored digest.
pub fn verify_password(user: &User, password: &str) -> bool {
    match hex::decode(&user.salt) {
        Ok(salt) => digest_hex(&salt, password) == user.digest,
        Err(_) => false,
    }
}

fn digest_hex(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Emits a fresh opaque session token.
pub fn generate_token(rng: &mut ChaCha20Rng) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn test_rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    #[test]
    fn test_password_round_trip() {
        let mut rng = test_rng();
        let (digest, salt) = hash_password(&mut rng, "pass1234");
        let user = User {
            user_id: 1,
            username: "alice".to_owned(),
            digest,
            salt,
            email: "a@b.com".to_owned(),
        };
        assert!(verify_password(&user, "pass1234"));
        assert!(!verify_password(&user, "pass12345"));
        assert!(!verify_password(&user, ""));
    }

    #[test]
    fn test_same_password_different_salts() {
        let mut rng = test_rng();
        let (digest1, salt1) = hash_password(&mut rng, "pass1234");
        let (digest2, salt2) = hash_password(&mut rng, "pass1234");
        assert_ne!(salt1, salt2);
        assert_ne!(digest1, digest2);
    }

    #[test]
    fn test_token_shape() {
        let mut rng = test_rng();
        let token = generate_token(&mut rng);
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token.bytes().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token(&mut rng));
    }
}
