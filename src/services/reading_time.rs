//! Reading time estimate

/// Assumed reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// Minutes needed to read `content`, rounded up.
///
/// Words are whitespace-separated tokens. Empty or blank content reads in
/// zero minutes.
pub fn estimate(content: &str) -> u32 {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_empty_content_is_zero() {
        assert_eq!(estimate(""), 0);
        assert_eq!(estimate("   \n\t "), 0);
    }

    #[test]
    fn test_rounds_up_to_whole_minutes() {
        assert_eq!(estimate("hello"), 1);
        assert_eq!(estimate(&words(200)), 1);
        assert_eq!(estimate(&words(201)), 2);
        assert_eq!(estimate(&words(401)), 3);
    }

    #[test]
    fn test_mixed_whitespace_separates_words() {
        let text = format!("{}\n\n{}", words(150), words(100));
        assert_eq!(estimate(&text), 2);
    }
}
