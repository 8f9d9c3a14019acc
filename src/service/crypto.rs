use sha3::{Digest, Sha3_256};

pub fn get_sha3_256_hash(data: &str) -> String {
    let mut hasher = Sha3_256::default();
    hasher.update(data.as_bytes());
    format!("{:X}", hasher.finalize())
}

pub fn hash_password(password: &str) -> String {
    get_sha3_256_hash(password)
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    hash_password(password) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trips_through_verify() {
        let hash = hash_password("Sup3r$ecret");
        assert!(verify_password("Sup3r$ecret", &hash));
        assert!(!verify_password("sup3r$ecret", &hash));
    }
}
