//! Tokenizer for kash input lines.
//!
//! A line is reduced to a flat sequence of typed tokens with the logos lexer
//! generator. The grammar is deliberately small:
//!
//! - **Words**: runs of non-whitespace, or a double-quoted span taken
//!   literally (internal whitespace preserved, quotes removed)
//! - **Pipe**: a standalone `|`
//! - **Redirect**: a standalone `>` (truncate) or `>>` (append)
//! - **Background**: a `&` suffix on the final unquoted word
//!
//! Comments are stripped before lexing: everything from the first unescaped
//! `#` to the end of the line is dropped. This happens before quotes are
//! considered, so `echo "a # b"` loses everything after `a`.

use logos::{Logos, Span};
use std::fmt;

/// A token with its byte span in the source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// How an output redirection opens its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectMode {
    /// `>`: create or truncate.
    Truncate,
    /// `>>`: create or append.
    Append,
}

/// Tokens handed to the pipeline builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Word(String),
    Pipe,
    RedirectOut(RedirectMode),
    Background,
}

impl Token {
    /// The word text, if this is a word.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{w}"),
            Token::Pipe => write!(f, "|"),
            Token::RedirectOut(RedirectMode::Truncate) => write!(f, ">"),
            Token::RedirectOut(RedirectMode::Append) => write!(f, ">>"),
            Token::Background => write!(f, "&"),
        }
    }
}

/// Raw lexemes before the background marker is split off.
///
/// Every byte of a line matches one of these patterns, so lexing cannot fail.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum Lexeme {
    #[token("|")]
    Pipe,

    #[token(">>")]
    Append,

    #[token(">")]
    Truncate,

    // An unterminated quote runs to the end of the line.
    #[regex(r#""[^"]*"?"#, unquote)]
    Quoted(String),

    #[regex(r#"[^ \t\r\n\f"]+"#, |lex| lex.slice().replace("\\#", "#"), priority = 1)]
    Bare(String),
}

fn unquote(lex: &mut logos::Lexer<'_, Lexeme>) -> String {
    let slice = lex.slice();
    let inner = &slice[1..];
    inner.strip_suffix('"').unwrap_or(inner).to_string()
}

/// Remove a trailing comment.
///
/// Returns the text before the first `#` that is not preceded by a backslash.
pub fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && (i == 0 || bytes[i - 1] != b'\\') {
            return &line[..i];
        }
    }
    line
}

/// The tokens of one input line together with the text they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenSequence {
    source: String,
    tokens: Vec<Spanned<Token>>,
}

impl TokenSequence {
    /// Comment-stripped, trimmed source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Tokens with their spans into [`source`](Self::source).
    pub fn spanned(&self) -> &[Spanned<Token>] {
        &self.tokens
    }

    /// Tokens without spans.
    pub fn tokens(&self) -> Vec<Token> {
        self.tokens.iter().map(|s| s.token.clone()).collect()
    }

    /// The leading word, if the line starts with one.
    pub fn first_word(&self) -> Option<&str> {
        self.tokens.first().and_then(|s| s.token.as_word())
    }

    /// Source text following the first token, untrimmed.
    pub fn rest_after_first(&self) -> &str {
        match self.tokens.first() {
            Some(first) => &self.source[first.span.end..],
            None => "",
        }
    }

    /// Whether the line asked to run in the background.
    pub fn is_background(&self) -> bool {
        self.tokens.iter().any(|s| s.token == Token::Background)
    }
}

/// Tokenize a raw input line.
///
/// Blank and comment-only lines produce an empty sequence.
pub fn tokenize(line: &str) -> TokenSequence {
    let source = strip_comment(line).trim().to_string();
    let mut tokens = Vec::new();

    let mut lexer = Lexeme::lexer(&source);
    let mut last_is_bare = false;
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let token = match result {
            Ok(Lexeme::Pipe) => Token::Pipe,
            Ok(Lexeme::Append) => Token::RedirectOut(RedirectMode::Append),
            Ok(Lexeme::Truncate) => Token::RedirectOut(RedirectMode::Truncate),
            Ok(Lexeme::Quoted(w)) => Token::Word(w),
            Ok(Lexeme::Bare(w)) => Token::Word(w),
            Err(()) => {
                tracing::debug!(?span, "skipping unlexable input");
                continue;
            }
        };
        last_is_bare = matches!(lexer.slice().as_bytes().first(), Some(b) if *b != b'"')
            && matches!(token, Token::Word(_));
        tokens.push(Spanned::new(token, span));
    }

    if last_is_bare {
        split_background(&mut tokens);
    }

    TokenSequence { source, tokens }
}

/// Split a trailing `&` off the final word into its own token.
fn split_background(tokens: &mut Vec<Spanned<Token>>) {
    let Some(last) = tokens.last_mut() else {
        return;
    };
    let Token::Word(word) = &mut last.token else {
        return;
    };
    if !word.ends_with('&') {
        return;
    }

    word.pop();
    let amp = last.span.end - 1..last.span.end;
    if word.is_empty() {
        tokens.pop();
    } else {
        last.span.end -= 1;
    }
    tokens.push(Spanned::new(Token::Background, amp));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<Token> {
        tokenize(line).tokens()
    }

    fn w(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn test_simple_words() {
        assert_eq!(words("ls -la /tmp"), vec![w("ls"), w("-la"), w("/tmp")]);
    }

    #[test]
    fn test_blank_and_comment_lines_are_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t ").is_empty());
        assert!(tokenize("# just a comment").is_empty());
        assert!(tokenize("   # indented comment").is_empty());
    }

    #[test]
    fn test_comment_truncates_line() {
        assert_eq!(words("echo hi # there"), vec![w("echo"), w("hi")]);
    }

    #[test]
    fn test_comment_inside_quotes_still_truncates() {
        let seq = tokenize(r#"echo "a # b""#);
        assert_eq!(seq.source(), r#"echo "a"#);
        assert_eq!(seq.tokens(), vec![w("echo"), w("a")]);
    }

    #[test]
    fn test_escaped_hash_is_literal() {
        assert_eq!(words(r"echo \#1"), vec![w("echo"), w("#1")]);
    }

    #[test]
    fn test_quoted_span_is_one_word() {
        assert_eq!(
            words(r#"echo "hello   world" done"#),
            vec![w("echo"), w("hello   world"), w("done")]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            words("cat f | tr a b >> out"),
            vec![
                w("cat"),
                w("f"),
                Token::Pipe,
                w("tr"),
                w("a"),
                w("b"),
                Token::RedirectOut(RedirectMode::Append),
                w("out"),
            ]
        );
        assert_eq!(
            words("echo x > out"),
            vec![w("echo"), w("x"), Token::RedirectOut(RedirectMode::Truncate), w("out")]
        );
    }

    #[test]
    fn test_unseparated_pipe_is_part_of_word() {
        assert_eq!(words("a|b"), vec![w("a|b")]);
    }

    #[test]
    fn test_quoted_operator_is_a_word() {
        assert_eq!(words(r#"echo "|""#), vec![w("echo"), w("|")]);
    }

    #[test]
    fn test_background_suffix() {
        let seq = tokenize("sleep 1&");
        assert_eq!(seq.tokens(), vec![w("sleep"), w("1"), Token::Background]);
        assert!(seq.is_background());
    }

    #[test]
    fn test_background_standalone() {
        assert_eq!(words("sleep 1 &"), vec![w("sleep"), w("1"), Token::Background]);
    }

    #[test]
    fn test_ampersand_in_middle_is_literal() {
        assert_eq!(words("echo a&b c"), vec![w("echo"), w("a&b"), w("c")]);
    }

    #[test]
    fn test_first_word_and_rest() {
        let seq = tokenize("!! | wc -l");
        assert_eq!(seq.first_word(), Some("!!"));
        assert_eq!(seq.rest_after_first(), " | wc -l");
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(words(r#"echo "open end"#), vec![w("echo"), w("open end")]);
    }
}
