//! Term splitting shared by full-text indexing and grouping by words

/// Characters that separate terms inside a text value
pub const TERM_SEPARATORS: &[char] = &[
    '\t', ',', ';', '.', '-', ':', '@', '[', ']', '(', ')', '{', '}', '_', '*', '/', ' ',
];

/// Split a text value into its non-empty terms
pub fn split_terms(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || TERM_SEPARATORS.contains(&c))
        .filter(|term| !term.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_terms() {
        let terms: Vec<_> = split_terms("john.doe@example.com (admin)").collect();
        assert_eq!(terms, vec!["john", "doe", "example", "com", "admin"]);
        assert_eq!(split_terms(" -- ").count(), 0);
    }
}
