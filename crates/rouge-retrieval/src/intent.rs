//! Completeness-intent detection over configurable phrase patterns.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    /// A representative answer is enough.
    Simple,
    /// The query asks for an exhaustive answer.
    Completeness,
}

const ENGLISH: &[&str] = &[
    "all",
    "every",
    "everything",
    "complete",
    "completely",
    "entire",
    "entirely",
    "whole",
    "full list",
    "in full",
    "list all",
    "exhaustive",
    "from start to end",
    "from beginning to end",
    "without omitting",
    "without skipping",
];

const ITALIAN: &[&str] = &[
    "tutti",
    "tutte",
    "completo",
    "intero",
    "elenco",
    "lista",
    "elenca",
    "per intero",
    "dall'inizio alla fine",
    "senza omettere",
    "completamente",
];

/// Ordered, case-insensitive phrase matcher.
///
/// A pattern matches when it occurs in the query starting at a word boundary. Word ends
/// are free, so `elenca` covers "elencare" and `all` matches "list all items" but not
/// "small".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentClassifier {
    patterns: Vec<String>,
}

impl IntentClassifier {
    #[must_use]
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn english() -> Self {
        Self::from_patterns(ENGLISH)
    }

    #[must_use]
    pub fn italian() -> Self {
        Self::from_patterns(ITALIAN)
    }

    /// Built-in pattern set for an ISO 639-1 language code.
    #[must_use]
    pub fn for_language(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "en" => Some(Self::english()),
            "it" => Some(Self::italian()),
            _ => None,
        }
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn classify(&self, query: &str) -> QueryIntent {
        if self.matched_pattern(query).is_some() {
            QueryIntent::Completeness
        } else {
            QueryIntent::Simple
        }
    }

    /// First pattern, in configured order, found in `query`.
    #[must_use]
    pub fn matched_pattern(&self, query: &str) -> Option<&str> {
        let query = query.to_lowercase();
        self.patterns
            .iter()
            .find(|p| contains_phrase(&query, p))
            .map(String::as_str)
    }
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    if !starts_word(phrase) {
        return haystack.contains(phrase);
    }
    haystack.match_indices(phrase).any(|(start, _)| {
        haystack[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

fn starts_word(phrase: &str) -> bool {
    phrase.chars().next().is_some_and(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_completeness_markers() {
        let c = IntentClassifier::english();
        assert_eq!(c.classify("List ALL the installation steps"), QueryIntent::Completeness);
        assert_eq!(c.classify("give me the entire procedure"), QueryIntent::Completeness);
        assert_eq!(
            c.classify("explain it from start to end"),
            QueryIntent::Completeness
        );
    }

    #[test]
    fn english_simple_queries() {
        let c = IntentClassifier::english();
        assert_eq!(c.classify("what is the default port?"), QueryIntent::Simple);
        assert_eq!(c.classify("a small question"), QueryIntent::Simple);
        assert_eq!(c.classify("recall the final price"), QueryIntent::Simple);
    }

    #[test]
    fn patterns_match_word_prefixes() {
        let c = IntentClassifier::english();
        assert_eq!(c.matched_pattern("completeness of the report"), Some("complete"));
        assert_eq!(c.classify("overall, what changed?"), QueryIntent::Simple);
        assert_eq!(c.classify("a small question"), QueryIntent::Simple);
    }

    #[test]
    fn italian_markers() {
        let c = IntentClassifier::italian();
        assert_eq!(c.classify("Elenca tutti gli articoli"), QueryIntent::Completeness);
        assert_eq!(
            c.classify("riporta il testo dall'inizio alla fine"),
            QueryIntent::Completeness
        );
        assert_eq!(c.classify("qual è la scadenza?"), QueryIntent::Simple);
    }

    #[test]
    fn italian_inflected_forms() {
        let c = IntentClassifier::italian();
        assert_eq!(c.classify("Puoi elencare i requisiti?"), QueryIntent::Completeness);
        assert_eq!(c.matched_pattern("Puoi elencare i requisiti?"), Some("elenca"));
        assert_eq!(
            c.classify("mostra i listati del capitolo"),
            QueryIntent::Completeness
        );
        assert_eq!(c.matched_pattern("mostra i listati del capitolo"), Some("lista"));
        assert_eq!(c.classify("una domanda sulla pallavolo"), QueryIntent::Simple);
    }

    #[test]
    fn first_pattern_in_order_is_reported() {
        let c = IntentClassifier::from_patterns(["entire list", "list"]);
        assert_eq!(c.matched_pattern("the entire list please"), Some("entire list"));
    }

    #[test]
    fn custom_patterns_replace_builtins() {
        let c = IntentClassifier::from_patterns(["  Every Clause ", ""]);
        assert_eq!(c.patterns(), ["every clause"]);
        assert_eq!(c.classify("quote every clause"), QueryIntent::Completeness);
        assert_eq!(c.classify("list all clauses"), QueryIntent::Simple);
    }

    #[test]
    fn empty_classifier_is_always_simple() {
        assert_eq!(
            IntentClassifier::default().classify("all of it"),
            QueryIntent::Simple
        );
    }

    #[test]
    fn punctuation_edged_patterns_match_inside_words() {
        let c = IntentClassifier::from_patterns(["-all"]);
        assert!(c.classify("run make-all").eq(&QueryIntent::Completeness));
    }

    #[test]
    fn for_language_codes() {
        assert_eq!(IntentClassifier::for_language("IT"), Some(IntentClassifier::italian()));
        assert!(IntentClassifier::for_language("fr").is_none());
    }
}
