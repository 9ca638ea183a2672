//! Redirection resolver (spec §4.1).
//!
//! Scans one stage's token sequence left to right, pulling out `<file` /
//! `>file` pairs and compacting the remaining literal words into a clean
//! argv. Opening the target files is a separate step (`open`) because the
//! two callers need different failure behavior: the single-command path
//! aborts before forking, the pipeline driver opens in the parent and tears
//! down prior stages on failure (spec §4.1, last paragraph).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;

use crate::error::ShellError;
use crate::token::Token;

const CREATE_MODE: u32 = 0o644;

/// The redirect targets pulled out of one stage's tokens. `None` means
/// "inherit the caller's default for that direction" (spec: "-1 meaning
/// inherit parent's").
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Redirection {
    pub input: Option<String>,
    pub output: Option<String>,
}

/// Remove `<` / `>` tokens (and their filename argument) from `tokens`,
/// returning the remaining literal words plus the redirect targets.
///
/// If a direction appears twice, the later one wins (spec: "earlier
/// descriptors are closed before the later open" — here that's just
/// overwriting the pending target, since nothing has been opened yet).
pub fn extract(tokens: &[Token]) -> Result<(Vec<String>, Redirection), ShellError> {
    let mut args = Vec::new();
    let mut redir = Redirection::default();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Lt => {
                let name = expect_literal(tokens, i + 1, "<")?;
                redir.input = Some(name);
                i += 2;
            }
            Token::Gt => {
                let name = expect_literal(tokens, i + 1, ">")?;
                redir.output = Some(name);
                i += 2;
            }
            Token::Word(w) => {
                args.push(w.clone());
                i += 1;
            }
            Token::End => {
                i += 1;
            }
            Token::Pipe | Token::Amp => {
                // The caller is responsible for stripping these before
                // handing a single stage's tokens to the resolver.
                i += 1;
            }
        }
    }

    Ok((args, redir))
}

fn expect_literal(tokens: &[Token], at: usize, op: &str) -> Result<String, ShellError> {
    match tokens.get(at) {
        Some(Token::Word(w)) => Ok(w.clone()),
        _ => Err(ShellError::MalformedRedirection(op.to_string())),
    }
}

/// Opened redirect descriptors, or `None` to inherit the parent's.
pub struct OpenRedirection {
    pub input: Option<File>,
    pub output: Option<File>,
}

/// Open the files named by `redir`. Input is read-only; output is
/// write-only, created if absent, mode 0644 (spec §4.1).
pub fn open(redir: &Redirection) -> Result<OpenRedirection, ShellError> {
    let input = match &redir.input {
        Some(path) => {
            Some(File::open(path).map_err(|e| ShellError::RedirectOpenFailure(path.clone(), e))?)
        }
        None => None,
    };

    let output = match &redir.output {
        Some(path) => Some(
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(CREATE_MODE)
                .open(path)
                .map_err(|e| ShellError::RedirectOpenFailure(path.clone(), e))?,
        ),
        None => None,
    };

    Ok(OpenRedirection { input, output })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    #[test]
    fn no_redirection() {
        let toks = tokenize("echo hi");
        let (args, redir) = extract(&toks).unwrap();
        assert_eq!(args, vec!["echo", "hi"]);
        assert_eq!(redir, Redirection::default());
    }

    #[test]
    fn input_and_output() {
        let toks = tokenize("sort < in.txt > out.txt");
        let (args, redir) = extract(&toks).unwrap();
        assert_eq!(args, vec!["sort"]);
        assert_eq!(redir.input.as_deref(), Some("in.txt"));
        assert_eq!(redir.output.as_deref(), Some("out.txt"));
    }

    #[test]
    fn missing_filename_is_malformed() {
        let toks = tokenize("echo >");
        assert!(extract(&toks).is_err());
    }

    #[test]
    fn repeated_direction_keeps_last() {
        let toks = tokenize("cmd > a.txt > b.txt");
        let (_, redir) = extract(&toks).unwrap();
        assert_eq!(redir.output.as_deref(), Some("b.txt"));
    }

    #[test]
    fn open_missing_input_file_fails() {
        let redir = Redirection {
            input: Some("/no/such/file/posh-test".to_string()),
            output: None,
        };
        match open(&redir) {
            Err(ShellError::RedirectOpenFailure(path, _)) => {
                assert_eq!(path, "/no/such/file/posh-test")
            }
            other => panic!("expected RedirectOpenFailure, got {other:?}"),
        }
    }
}
