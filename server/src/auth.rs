use rand::Rng;
use sha1::{Digest, Sha1};

/// 20 byte handshake scramble. Bytes stay in 1..=127 so the null
/// terminator never appears inside the nonce.
pub fn generate_scramble() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..20).map(|_| rng.gen_range(1..=127u8)).collect()
}

pub fn sha1(value: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(value);
    hasher.finalize().as_slice().to_vec()
}

pub fn xor(slice1: &[u8], slice2: &[u8]) -> Vec<u8> {
    let mut result = vec![0u8; slice1.len()];
    for i in 0..result.len() {
        result[i] = slice1[i] ^ slice2[i % slice2.len()];
    }
    result
}

/// The token a mysql_native_password client derives:
/// `SHA1(password) XOR SHA1(scramble + SHA1(SHA1(password)))`.
pub fn native_password_token(password: &str, scramble: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let password_hash = sha1(password.as_bytes());
    let concat_hash = [scramble.to_vec(), sha1(&password_hash)].concat();
    xor(&password_hash, &sha1(&concat_hash))
}

/// Verify a client token against the configured plaintext password.
pub fn verify_native_password(password: &str, scramble: &[u8], token: &[u8]) -> bool {
    if password.is_empty() {
        return token.is_empty();
    }
    let expected = native_password_token(password, scramble);
    expected.len() == token.len() && expected == token
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn token_round_trip() {
        let scramble = generate_scramble();
        assert_eq!(scramble.len(), 20);
        assert!(scramble.iter().all(|b| *b != 0));

        let token = native_password_token("secret", &scramble);
        assert!(verify_native_password("secret", &scramble, &token));
        assert!(!verify_native_password("other", &scramble, &token));
    }

    #[test]
    fn empty_password_expects_empty_token() {
        let scramble = generate_scramble();
        assert!(verify_native_password("", &scramble, &[]));
        assert!(!verify_native_password("", &scramble, &[1, 2, 3]));
    }
}
