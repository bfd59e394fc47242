use sha2::{Digest, Sha256};

const SALT_BYTES: usize = 4;

/// Admin password in the form the gateway stores it: `[<salt>]<sha256 hex of password+salt>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltedPassword {
    salt: String,
    hash: String,
}

impl SaltedPassword {
    /// Hashes `password` with a fresh 8-hex-digit salt.
    pub fn generate(password: &str) -> Self {
        let salt = hex::encode(rand::random::<[u8; SALT_BYTES]>());
        Self::with_salt(password, &salt)
    }

    pub fn with_salt(password: &str, salt: &str) -> Self {
        let digest = Sha256::digest(format!("{password}{salt}").as_bytes());
        Self {
            salt: salt.to_string(),
            hash: hex::encode(digest),
        }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn encoded(&self) -> String {
        format!("[{}]{}", self.salt, self.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_covers_password_then_salt() {
        let pw = SaltedPassword::with_salt("password", "1a2b3c4d");
        let expected = hex::encode(Sha256::digest(b"password1a2b3c4d"));
        assert_eq!(pw.encoded(), format!("[1a2b3c4d]{expected}"));
    }

    #[test]
    fn generated_salt_is_eight_hex_digits() {
        let pw = SaltedPassword::generate("password");
        assert_eq!(pw.salt().len(), 8);
        assert!(pw.salt().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(pw.encoded().len(), 2 + 8 + 64);
    }
}
