//! Splitting delimited friend lists into tokens

use std::collections::HashSet;

/// How a delimited friend list is turned into friend identifiers.
///
/// Empty tokens (`"a,,b"`, trailing delimiters, an empty list) are always
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRules {
    /// Separator between identifiers
    pub delimiter: char,
    /// Strip surrounding whitespace from each token
    pub trim: bool,
    /// Keep only the first occurrence of a repeated token
    pub dedupe: bool,
}

impl Default for TokenRules {
    fn default() -> Self {
        Self {
            delimiter: ',',
            trim: true,
            dedupe: true,
        }
    }
}

impl TokenRules {
    /// Split a friend list in source order. `None` yields no tokens.
    pub fn split<'a>(&self, friend_list: Option<&'a str>) -> Vec<&'a str> {
        let Some(list) = friend_list else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        list.split(self.delimiter)
            .map(|token| if self.trim { token.trim() } else { token })
            .filter(|token| !token.is_empty())
            .filter(|token| !self.dedupe || seen.insert(*token))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_list() {
        let rules = TokenRules::default();
        assert_eq!(rules.split(Some("a,b,c")), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_or_empty_list_yields_nothing() {
        let rules = TokenRules::default();
        assert!(rules.split(None).is_empty());
        assert!(rules.split(Some("")).is_empty());
        assert!(rules.split(Some(",")).is_empty());
        assert!(rules.split(Some(" , ,")).is_empty());
    }

    #[test]
    fn test_empty_tokens_dropped() {
        let rules = TokenRules::default();
        assert_eq!(rules.split(Some("a,,b,")), vec!["a", "b"]);
    }

    #[test]
    fn test_trim() {
        let rules = TokenRules::default();
        assert_eq!(rules.split(Some(" a , b ")), vec!["a", "b"]);

        let raw = TokenRules {
            trim: false,
            ..TokenRules::default()
        };
        assert_eq!(raw.split(Some(" a ,b")), vec![" a ", "b"]);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let rules = TokenRules::default();
        assert_eq!(rules.split(Some("b,a,b, a")), vec!["b", "a"]);

        let keep = TokenRules {
            dedupe: false,
            ..TokenRules::default()
        };
        assert_eq!(keep.split(Some("a,a")), vec!["a", "a"]);
    }

    #[test]
    fn test_custom_delimiter() {
        let rules = TokenRules {
            delimiter: '|',
            ..TokenRules::default()
        };
        assert_eq!(rules.split(Some("a|b,c")), vec!["a", "b,c"]);
    }
}
