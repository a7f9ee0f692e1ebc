//! Text helpers shared by keyword scoring and hashing embeddings.

/// Split text into lowercase alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("What is X? Rust's borrow-checker!"),
            vec!["what", "is", "x", "rust", "s", "borrow", "checker"]
        );
        assert!(tokenize("  ,.;  ").is_empty());
    }
}
