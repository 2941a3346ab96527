//! Secret comparison for operator tokens and team keys

use subtle::ConstantTimeEq;

/// Constant-time equality of two secrets; different lengths never match
pub fn secrets_match(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_secrets_match() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(secrets_match("", ""));
    }

    #[test]
    fn prefixes_and_mismatches_rejected() {
        assert!(!secrets_match("s3cre", "s3cret"));
        assert!(!secrets_match("s3cret!", "s3cret"));
        assert!(!secrets_match("S3cret", "s3cret"));
        assert!(!secrets_match("", "s3cret"));
    }
}
