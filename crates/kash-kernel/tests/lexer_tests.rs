//! Tokenizer tests using rstest for parameterization.
//!
//! Each case renders the token sequence in a compact one-line form so the
//! expected shape reads like the input.

use kash_kernel::lexer::{strip_comment, tokenize, RedirectMode, Token};
use rstest::rstest;

/// Format a token for comparison.
fn format_token(token: &Token) -> String {
    match token {
        Token::Word(w) => format!("WORD({w})"),
        Token::Pipe => "PIPE".to_string(),
        Token::RedirectOut(RedirectMode::Truncate) => "GT".to_string(),
        Token::RedirectOut(RedirectMode::Append) => "GTGT".to_string(),
        Token::Background => "AMP".to_string(),
    }
}

fn lex(input: &str) -> String {
    tokenize(input)
        .tokens()
        .iter()
        .map(format_token)
        .collect::<Vec<_>>()
        .join(" ")
}

#[rstest]
#[case::bare("ls", "WORD(ls)")]
#[case::args("ls -la /tmp", "WORD(ls) WORD(-la) WORD(/tmp)")]
#[case::tabs("ls\t-l", "WORD(ls) WORD(-l)")]
#[case::surrounding_space("   pwd   ", "WORD(pwd)")]
#[case::quoted("echo \"a  b\"", "WORD(echo) WORD(a  b)")]
#[case::empty_quotes("echo \"\"", "WORD(echo) WORD()")]
#[case::quote_joins_nothing("echo x\"y z\"", "WORD(echo) WORD(x) WORD(y z)")]
fn words(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(lex(input), expected);
}

#[rstest]
#[case::pipe("a | b", "WORD(a) PIPE WORD(b)")]
#[case::double_pipe("a | b | c", "WORD(a) PIPE WORD(b) PIPE WORD(c)")]
#[case::truncate("echo x > f", "WORD(echo) WORD(x) GT WORD(f)")]
#[case::append("echo x >> f", "WORD(echo) WORD(x) GTGT WORD(f)")]
#[case::pipe_then_redirect("a | b > f", "WORD(a) PIPE WORD(b) GT WORD(f)")]
#[case::background("sleep 1 &", "WORD(sleep) WORD(1) AMP")]
#[case::background_suffix("sleep 1&", "WORD(sleep) WORD(1) AMP")]
#[case::background_pipeline("a | b&", "WORD(a) PIPE WORD(b) AMP")]
fn operators(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(lex(input), expected);
}

#[rstest]
#[case::quoted_ampersand("echo \"x&\"", "WORD(echo) WORD(x&)")]
#[case::inner_ampersand("echo a&b", "WORD(echo) WORD(a&b)")]
#[case::glued_pipe("a|b", "WORD(a|b)")]
#[case::glued_redirect("echo x>f", "WORD(echo) WORD(x>f)")]
#[case::quoted_pipe("echo \"|\"", "WORD(echo) WORD(|)")]
fn literal_operators(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(lex(input), expected);
}

#[rstest]
#[case::blank("")]
#[case::spaces("     ")]
#[case::comment("# nothing to see")]
#[case::indented_comment("    # still nothing")]
fn empty_lines(#[case] input: &str) {
    assert!(tokenize(input).is_empty());
}

#[rstest]
#[case::none("echo hi", "echo hi")]
#[case::trailing("echo hi # note", "echo hi ")]
#[case::escaped(r"echo \#1 # note", r"echo \#1 ")]
#[case::inside_quotes("echo \"a # b\"", "echo \"a ")]
#[case::leading("#!/bin/kash", "")]
fn comments(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(strip_comment(input), expected);
}

#[test]
fn source_is_stripped_and_trimmed() {
    let seq = tokenize("  cat f | tr a b   # upper  ");
    assert_eq!(seq.source(), "cat f | tr a b");
}

#[test]
fn spans_index_the_source() {
    let seq = tokenize("echo \"two words\" > out");
    let slices: Vec<&str> = seq
        .spanned()
        .iter()
        .map(|s| &seq.source()[s.span.clone()])
        .collect();
    assert_eq!(slices, vec!["echo", "\"two words\"", ">", "out"]);
}

#[test]
fn long_lines_are_not_capped() {
    let line = (0..500).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
    assert_eq!(tokenize(&line).len(), 500);
}
