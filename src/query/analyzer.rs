//! Text analysis shared by query compilation and index matching.

/// Splits text into index terms.
///
/// The same analyzer must be used for queries and for the content they
/// are matched against, or terms will not line up.
pub trait Analyzer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercasing analyzer that keeps email addresses whole and also indexes
/// their local part and domain.
///
/// `"Mail from Alice@Example.com!"` →
/// `["mail", "from", "alice@example.com", "alice", "example.com"]`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        let lower = text.to_lowercase();
        for raw in lower.split(|c: char| !(c.is_alphanumeric() || "@._-+*".contains(c))) {
            let word = raw.trim_matches(|c: char| c == '.' || c == '-' || c == '_');
            if word.is_empty() {
                continue;
            }
            terms.push(word.to_string());
            if let Some((local, domain)) = word.split_once('@') {
                if !local.is_empty() {
                    terms.push(local.to_string());
                }
                if !domain.is_empty() {
                    terms.push(domain.to_string());
                }
            }
        }
        terms
    }
}

/// Whether `term` matches one of `tokens`. A trailing `*` makes the term
/// a prefix match.
pub fn term_matches(term: &str, tokens: &[String]) -> bool {
    match term.strip_suffix('*') {
        Some(prefix) => tokens.iter().any(|t| t.starts_with(prefix)),
        None => tokens.iter().any(|t| t == term),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_words_and_addresses() {
        let terms = StandardAnalyzer.tokenize("Mail from Alice@Example.com!");
        assert_eq!(
            terms,
            vec!["mail", "from", "alice@example.com", "alice", "example.com"]
        );
    }

    #[test]
    fn test_tokenize_trims_sentence_punctuation() {
        let terms = StandardAnalyzer.tokenize("Budget... (final) report.");
        assert_eq!(terms, vec!["budget", "final", "report"]);
    }

    #[test]
    fn test_prefix_match() {
        let tokens = StandardAnalyzer.tokenize("quarterly budget");
        assert!(term_matches("budg*", &tokens));
        assert!(term_matches("budget", &tokens));
        assert!(!term_matches("budg", &tokens));
    }
}
