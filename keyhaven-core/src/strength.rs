//! Deterministic secret strength scoring.

/// Score a secret from 0 to 4.
///
/// +1 for length >= 8, +1 for length >= 12, +1 for mixed case,
/// +1 for a digit, +1 for a non-alphanumeric character; capped at 4.
pub fn strength_score(secret: &str) -> u8 {
    let mut score = 0u8;

    let length = secret.chars().count();
    if length >= 8 {
        score += 1;
    }
    if length >= 12 {
        score += 1;
    }

    let has_lower = secret.chars().any(|c| c.is_lowercase());
    let has_upper = secret.chars().any(|c| c.is_uppercase());
    if has_lower && has_upper {
        score += 1;
    }
    if secret.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if secret.chars().any(|c| !c.is_alphanumeric()) {
        score += 1;
    }

    score.min(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(strength_score(""), 0);
    }

    #[test]
    fn test_short_lowercase_scores_zero() {
        assert_eq!(strength_score("aaa"), 0);
    }

    #[test]
    fn test_length_thresholds() {
        assert_eq!(strength_score("aaaaaaaa"), 1);
        assert_eq!(strength_score("aaaaaaaaaaaa"), 2);
    }

    #[test]
    fn test_mixed_case_and_digit() {
        assert_eq!(strength_score("Hunter2A"), 3);
    }

    #[test]
    fn test_full_charset_long_caps_at_four() {
        assert_eq!(strength_score("Correct-Horse-Battery-Staple-9"), 4);
    }

    #[test]
    fn test_symbols_count() {
        // 8 chars, mixed case, digit, symbol: 1 + 1 + 1 + 1 = 4
        assert_eq!(strength_score("Aa1!aaaa"), 4);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(strength_score("Pass123!"), strength_score("Pass123!"));
    }
}
