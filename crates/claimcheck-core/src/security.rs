use std::env;

use crate::ClaimCheckError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, ClaimCheckError> {
    optional_env(var).ok_or_else(|| ClaimCheckError::MissingSecret(var.to_string()))
}

/// Read an environment variable if it is set and non-empty.
pub fn optional_env(var: &str) -> Option<SecretValue> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Some(SecretValue(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_env_success() {
        unsafe {
            std::env::set_var("CLAIMCHECK_TEST_SECRET", "value");
        }
        let secret = require_env("CLAIMCHECK_TEST_SECRET").expect("secret should load");
        assert_eq!(secret.expose(), "value");
        assert_eq!(format!("{secret:?}"), "***redacted***");
    }

    #[test]
    fn require_env_missing() {
        unsafe {
            std::env::remove_var("CLAIMCHECK_TEST_SECRET_MISSING");
        }
        let err = require_env("CLAIMCHECK_TEST_SECRET_MISSING").unwrap_err();
        assert!(matches!(err, ClaimCheckError::MissingSecret(_)));
    }

    #[test]
    fn blank_values_count_as_missing() {
        unsafe {
            std::env::set_var("CLAIMCHECK_TEST_SECRET_BLANK", "   ");
        }
        assert!(optional_env("CLAIMCHECK_TEST_SECRET_BLANK").is_none());
    }
}
