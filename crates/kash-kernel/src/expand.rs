//! History expansion: `!!`, `!n` and `!prefix`.
//!
//! Only the first word of a line is considered. A reference that resolves is
//! replaced by the stored command text and the line is tokenized again, so a
//! recalled command keeps its pipes and redirections.

use crate::error::ShellError;
use crate::history::HistoryStore;
use crate::lexer::{tokenize, TokenSequence};

/// A parsed `!` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRef<'a> {
    /// `!!`
    Last,
    /// `!n`
    Id(u64),
    /// `!text`
    Prefix(&'a str),
}

impl<'a> HistoryRef<'a> {
    /// Parse a word as a history reference.
    ///
    /// Returns `None` unless the word starts with `!` and has more after it.
    pub fn parse(word: &'a str) -> Option<Self> {
        let body = word.strip_prefix('!')?;
        if body.is_empty() {
            return None;
        }
        if body == "!" {
            return Some(HistoryRef::Last);
        }
        if body.bytes().all(|b| b.is_ascii_digit())
            && let Ok(id) = body.parse::<u64>()
        {
            return Some(HistoryRef::Id(id));
        }
        Some(HistoryRef::Prefix(body))
    }
}

/// Resolve `first_word` against the store.
///
/// Returns the stored command text on a hit. A miss (including `!!` on an
/// empty store) yields `None` and the caller keeps the literal word.
pub fn expand(first_word: &str, store: &HistoryStore) -> Option<String> {
    let reference = HistoryRef::parse(first_word)?;
    let entry = match reference {
        HistoryRef::Last => store.most_recent(),
        HistoryRef::Id(id) => store.by_id(id),
        HistoryRef::Prefix(prefix) => store.by_prefix_most_recent(prefix),
    };
    entry.map(|e| e.command.clone())
}

/// Expand a leading history reference in a tokenized line.
///
/// On a hit the resolved text is joined with whatever followed the reference
/// and tokenized again. On a miss the sequence is returned unchanged along
/// with a silent [`ShellError::HistoryReferenceNotFound`].
pub fn expand_line(
    seq: TokenSequence,
    store: &HistoryStore,
) -> (TokenSequence, Option<ShellError>) {
    let Some(word) = seq.first_word() else {
        return (seq, None);
    };
    if HistoryRef::parse(word).is_none() {
        return (seq, None);
    }

    match expand(word, store) {
        Some(resolved) => {
            let line = format!("{}{}", resolved, seq.rest_after_first());
            tracing::debug!(reference = word, %line, "history expansion");
            (tokenize(&line), None)
        }
        None => {
            let err = ShellError::HistoryReferenceNotFound(word.to_string());
            tracing::debug!(%err, "history expansion missed");
            (seq, Some(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::PendingEntry;
    use crate::lexer::Token;

    fn store_with(commands: &[&str]) -> HistoryStore {
        let mut store = HistoryStore::default();
        for cmd in commands {
            store.append(PendingEntry::now(*cmd));
        }
        store
    }

    #[test]
    fn test_parse_references() {
        assert_eq!(HistoryRef::parse("!!"), Some(HistoryRef::Last));
        assert_eq!(HistoryRef::parse("!12"), Some(HistoryRef::Id(12)));
        assert_eq!(HistoryRef::parse("!ec"), Some(HistoryRef::Prefix("ec")));
        assert_eq!(HistoryRef::parse("!12abc"), Some(HistoryRef::Prefix("12abc")));
        assert_eq!(HistoryRef::parse("!-1"), Some(HistoryRef::Prefix("-1")));
        assert_eq!(HistoryRef::parse("!"), None);
        assert_eq!(HistoryRef::parse("echo"), None);
    }

    #[test]
    fn test_bang_bang_on_empty_store() {
        let store = HistoryStore::default();
        assert_eq!(expand("!!", &store), None);
    }

    #[test]
    fn test_expand_line_keeps_trailing_words() {
        let store = store_with(&["echo a"]);
        let (seq, miss) = expand_line(tokenize("!! | tr a b"), &store);
        assert!(miss.is_none());
        assert_eq!(seq.source(), "echo a | tr a b");
        assert_eq!(seq.len(), 6);
    }

    #[test]
    fn test_expand_line_reinterprets_operators() {
        let store = store_with(&["cat f | wc -l > out"]);
        let (seq, _) = expand_line(tokenize("!1"), &store);
        assert!(seq.tokens().contains(&Token::Pipe));
    }

    #[test]
    fn test_expand_line_miss_passes_through() {
        let store = store_with(&["ls"]);
        let (seq, miss) = expand_line(tokenize("!nothing here"), &store);
        assert_eq!(seq.first_word(), Some("!nothing"));
        assert!(matches!(miss, Some(ShellError::HistoryReferenceNotFound(w)) if w == "!nothing"));
    }
}
