//! Main evaluation loop glue (spec §4.8 "Evaluation"): tokenize a line,
//! strip a trailing background flag, split on `|` into pipeline stages,
//! resolve each stage's redirections, then dispatch to a built-in or to the
//! pipeline driver.

use crate::builtins;
use crate::foreground;
use crate::jobs::{JobTable, SlotClass};
use crate::pipeline::{self, Stage};
use crate::redirect;
use crate::token::{self, Token};

pub enum Outcome {
    Continue(i32),
    Exit(i32),
}

/// Strip a trailing `&` (the very last non-`End` token) and report whether
/// it was present.
fn strip_trailing_background(tokens: &mut Vec<Token>) -> bool {
    // tokens always ends with Token::End.
    let last_real = tokens.len().checked_sub(2);
    if let Some(idx) = last_real {
        if tokens[idx] == Token::Amp {
            tokens.remove(idx);
            return true;
        }
    }
    false
}

fn split_stages(tokens: Vec<Token>) -> Vec<Vec<Token>> {
    let mut stages = vec![Vec::new()];
    for tok in tokens {
        match tok {
            Token::Pipe => stages.push(Vec::new()),
            Token::End => {}
            other => stages.last_mut().unwrap().push(other),
        }
    }
    for stage in &mut stages {
        stage.push(Token::End);
    }
    stages
}

pub fn evaluate(input: &str, table: &mut JobTable, tty_fd: libc::c_int) -> Outcome {
    let mut tokens = token::tokenize(input);
    let background = strip_trailing_background(&mut tokens);

    let mut stages: Vec<Stage> = Vec::new();
    for raw in split_stages(tokens) {
        match redirect::extract(&raw) {
            Ok((argv, redirection)) => stages.push(Stage { argv, redirection }),
            Err(e) => {
                eprintln!("{e}");
                return Outcome::Continue(e.exit_code());
            }
        }
    }

    // Trailing `&` with no command body, or a wholly empty/whitespace line,
    // tokenizes to one stage with an empty argv: no job created (spec §8
    // boundary cases).
    if stages.len() == 1 && stages[0].argv.is_empty() {
        return Outcome::Continue(0);
    }
    if stages.iter().any(|s| s.argv.is_empty()) {
        eprintln!("jsh: syntax error: empty pipeline stage");
        return Outcome::Continue(2);
    }

    if stages.len() == 1 && builtins::is_builtin(&stages[0].argv[0]) {
        let program = stages[0].argv[0].clone();
        let args = stages[0].argv[1..].to_vec();
        return match builtins::execute(&program, &args, table, tty_fd) {
            builtins::Outcome::Continue(code) => Outcome::Continue(code),
            builtins::Outcome::Exit(code) => Outcome::Exit(code),
        };
    }

    let class = if background {
        SlotClass::Background
    } else {
        SlotClass::Foreground
    };

    match pipeline::spawn_stages(&stages, class, table) {
        Ok(slot) => {
            let command_text = table.get(slot).unwrap().command_text.clone();
            if background {
                println!("[{slot}] running '{command_text}'");
                Outcome::Continue(0)
            } else {
                match foreground::run(table, tty_fd) {
                    foreground::Outcome::Finished(code) => Outcome::Continue(code),
                    foreground::Outcome::Stopped(new_slot) => {
                        println!("{}", table.get(new_slot).unwrap().describe(new_slot));
                        Outcome::Continue(-1)
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("{e}");
            Outcome::Continue(e.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_amp_is_stripped_and_reported() {
        let mut tokens = token::tokenize("sleep 10 &");
        assert!(strip_trailing_background(&mut tokens));
        assert!(!tokens.contains(&Token::Amp));
    }

    #[test]
    fn amp_mid_line_is_not_background() {
        // `&` must be the very last non-End token to count (spec §6).
        let mut tokens = token::tokenize("echo a & echo b");
        assert!(!strip_trailing_background(&mut tokens));
    }

    #[test]
    fn pipe_splits_into_stages() {
        let tokens = token::tokenize("yes | head -n 3");
        let stages = split_stages(tokens);
        assert_eq!(stages.len(), 2);
    }
}
