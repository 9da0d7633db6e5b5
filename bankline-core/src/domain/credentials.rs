//! Password credential models

use serde::{Deserialize, Serialize};

/// Default Argon2id parameters
pub const DEFAULT_TIME_COST: u32 = 3;
pub const DEFAULT_MEMORY_COST: u32 = 65536; // 64 MiB
pub const DEFAULT_PARALLELISM: u32 = 4;
pub const DEFAULT_HASH_LEN: u32 = 32;

/// Argon2id parameters for password hashing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argon2Params {
    pub time_cost: u32,
    pub memory_cost: u32,
    pub parallelism: u32,
    pub hash_len: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            time_cost: DEFAULT_TIME_COST,
            memory_cost: DEFAULT_MEMORY_COST,
            parallelism: DEFAULT_PARALLELISM,
            hash_len: DEFAULT_HASH_LEN,
        }
    }
}

/// Stored password hash in PHC string format
///
/// `$argon2id$v=19$m=..,t=..,p=..$<salt>$<hash>`: the salt and the
/// parameters a hash was produced with travel with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordCredential {
    pub phc: String,
}

impl PasswordCredential {
    pub fn new(phc: impl Into<String>) -> Self {
        Self { phc: phc.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = Argon2Params::default();
        assert_eq!(params.time_cost, 3);
        assert_eq!(params.memory_cost, 65536);
        assert_eq!(params.hash_len, 32);
    }

    #[test]
    fn test_params_json_shape() {
        let json = serde_json::to_value(Argon2Params::default()).unwrap();
        assert_eq!(json["memoryCost"], 65536);
        assert_eq!(json["timeCost"], 3);
    }
}
