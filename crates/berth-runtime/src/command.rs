//! Shell-like splitting of command strings into argument vectors.
//!
//! Deliberately lenient: quotes group words and are stripped, but there is
//! no escaping, no nesting, and no error for an unterminated quote.

/// Splits a command string into arguments.
///
/// Unquoted whitespace separates arguments and runs of it collapse. A
/// single- or double-quoted span is copied verbatim up to the matching
/// quote; the other quote character inside it is literal. An unterminated
/// quote simply ends with the input.
#[must_use]
pub fn parse(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(open) if ch == open => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_quotes_group_words() {
        assert_eq!(parse(r#"a "b c" d"#), vec!["a", "b c", "d"]);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("   \t  ").is_empty());
    }

    #[test]
    fn shell_wrapper_keeps_script_intact() {
        assert_eq!(parse(r#"sh -c "x y""#), vec!["sh", "-c", "x y"]);
    }

    #[test]
    fn unterminated_quote_emits_partial_argument() {
        assert_eq!(parse(r#"a "b"#), vec!["a", "b"]);
        assert_eq!(parse("a '"), vec!["a"]);
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(parse("  ls   -la\t/tmp  "), vec!["ls", "-la", "/tmp"]);
    }

    #[test]
    fn other_quote_is_literal_inside_a_span() {
        assert_eq!(parse(r#"echo "it's""#), vec!["echo", "it's"]);
        assert_eq!(parse(r#"echo 'say "hi"'"#), vec!["echo", r#"say "hi""#]);
    }

    #[test]
    fn quotes_join_adjacent_text() {
        assert_eq!(parse(r#"--name="my app" x"#), vec!["--name=my app", "x"]);
    }

    #[test]
    fn empty_quotes_produce_no_argument() {
        assert_eq!(parse(r#"a "" b"#), vec!["a", "b"]);
    }
}
