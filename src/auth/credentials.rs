//! Password hashing (modern path, `bcrypt`) and legacy MD5
//! challenge-response (`md-5`), grounded in `original_source/core/user.py`'s
//! `msn_login_md5`/`msn_get_md5_salt`.

use md5::{Digest, Md5};
use rand::Rng;

pub struct Credentials;

impl Credentials {
    pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(plain, bcrypt::DEFAULT_COST)
    }

    pub fn verify_password(plain: &str, hash: &str) -> bool {
        bcrypt::verify(plain, hash).unwrap_or(false)
    }

    /// A fresh per-login salt for the legacy MD5 challenge-response path.
    pub fn generate_md5_salt() -> String {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 16] = rng.gen();
        hex::encode(bytes)
    }

    /// `md5(salt + md5(password_unsalted))`, matching the MSNP legacy
    /// challenge scheme: the server holds `pw_md5_unsalted` and compares
    /// the client-submitted hex digest against this.
    pub fn md5_challenge_response(salt: &str, pw_md5_unsalted: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(salt.as_bytes());
        hasher.update(pw_md5_unsalted.as_bytes());
        hex::encode(hasher.finalize())
    }
}
