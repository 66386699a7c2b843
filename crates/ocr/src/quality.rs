//! Recognition-quality scoring.

/// Fraction of alphanumeric characters in `text`, in `[0.0, 1.0]`.
///
/// Garbled recognitions skew toward punctuation and stray symbols, so a
/// higher ratio means a cleaner read. Empty text scores zero.
pub fn alnum_ratio(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();
    alnum as f32 / total.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(alnum_ratio(""), 0.0);
    }

    #[test]
    fn pure_symbols_score_zero() {
        assert_eq!(alnum_ratio("*** !!! ---"), 0.0);
    }

    #[test]
    fn pure_letters_score_one() {
        assert_eq!(alnum_ratio("abcXYZ123"), 1.0);
    }

    #[test]
    fn mixed_text_scores_the_alnum_fraction() {
        // 2 alphanumeric characters out of 5.
        assert_eq!(alnum_ratio(" ab \n"), 0.4);
        // "no 42" is 4 alphanumeric out of 5.
        assert_eq!(alnum_ratio("no 42"), 0.8);
    }

    #[test]
    fn counts_characters_not_bytes() {
        // Two multibyte letters and one space.
        let ratio = alnum_ratio("é½ ");
        assert!((ratio - 2.0 / 3.0).abs() < 1e-6);
    }
}
