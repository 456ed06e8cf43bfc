//! Token classification.
//!
//! Classification is purely syntactic; whether a `-x` token is really an
//! option or a negative number is decided by the binder, which knows the
//! registered names.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `--name` or `--name=value`.
    Long { name: &'a str, value: Option<&'a str> },
    /// `-x`, `-xyz` or `-ofile`; `cluster` excludes the leading `-`.
    Short { cluster: &'a str },
    Positional(&'a str),
    /// `--`: every later token is positional.
    Separator,
}

pub fn classify(arg: &str) -> Token<'_> {
    if arg == "--" {
        return Token::Separator;
    }
    if let Some(body) = arg.strip_prefix("--") {
        return match body.split_once('=') {
            Some((name, value)) => Token::Long {
                name: &arg[..name.len() + 2],
                value: Some(value),
            },
            None => Token::Long {
                name: arg,
                value: None,
            },
        };
    }
    match arg.strip_prefix('-') {
        Some(cluster) if !cluster.is_empty() => Token::Short { cluster },
        _ => Token::Positional(arg),
    }
}

/// Classify a whole token stream; everything after the first `--` is positional.
pub fn lex<S: AsRef<str>>(tokens: &[S]) -> Vec<Token<'_>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut after_separator = false;
    for token in tokens {
        let arg = token.as_ref();
        if after_separator {
            out.push(Token::Positional(arg));
            continue;
        }
        let class = classify(arg);
        if class == Token::Separator {
            after_separator = true;
        }
        out.push(class);
    }
    out
}

/// `-1`, `-2.5`, `-1e3`.
pub fn is_number(arg: &str) -> bool {
    let body = arg.strip_prefix('-').unwrap_or(arg);
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.') && arg.parse::<f64>().is_ok()
}

/// Whether a token would be read as an option if not consumed as a value.
pub(crate) fn looks_like_option(arg: &str) -> bool {
    arg.starts_with('-') && arg != "-"
}
