//! Shell driver: owns the job table and dispatches token lines.

use crate::builtins;
use crate::job::JobTable;
use crate::launch;
use crate::lexer::{self, Token};
use crate::reap::{self, FinishedJob};

/// Driver state: the job table plus background completions not yet
/// announced. One per shell; tests build their own.
pub struct Shell {
    jobs: JobTable,
    finished: Vec<FinishedJob>,
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            jobs: JobTable::new(),
            finished: Vec::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Deferred signal processing; call once per main-loop iteration.
    pub fn poll_signals(&mut self) {
        let finished = reap::process_pending(&mut self.jobs);
        self.finished.extend(finished);
    }

    /// Background jobs that completed since the last call, for the main
    /// loop to announce.
    pub fn take_finished(&mut self) -> Vec<FinishedJob> {
        std::mem::take(&mut self.finished)
    }

    /// Lex and run one command line. Returns 0 when the line was accepted
    /// and launched, 1 when it was rejected or the launch failed.
    pub fn run_line(&mut self, line: &str) -> i32 {
        let tokens = match lexer::lex(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("jobsh: {}", err);
                return 1;
            }
        };
        if tokens.is_empty() {
            return 0;
        }
        self.run_tokens(tokens)
    }

    fn run_tokens(&mut self, mut tokens: Vec<Token>) -> i32 {
        // A trailing `&` backgrounds the whole line; anywhere else it is
        // an error.
        let background = matches!(tokens.last(), Some(Token::Background));
        if background {
            tokens.pop();
        }
        if tokens.iter().any(|t| matches!(t, Token::Background)) {
            eprintln!("jobsh: misplaced '&'");
            return 1;
        }
        if tokens.is_empty() {
            eprintln!("jobsh: missing command before '&'");
            return 1;
        }

        // A lone top-level built-in runs here, in the shell process, so
        // `cd` and `exit` can take effect. A trailing `&` on such a line
        // is ignored rather than forking a throwaway child.
        if let Some(builtin) = top_level_builtin(&tokens) {
            let args: Vec<String> = tokens[1..]
                .iter()
                .filter_map(|t| t.word().map(str::to_string))
                .collect();
            return match builtins::run(builtin, &args, false) {
                Ok(()) => 0,
                Err(err) => {
                    eprintln!("jobsh: {}", err);
                    1
                }
            };
        }

        match launch::launch(&mut self.jobs, &tokens, background) {
            Ok(_) => 0,
            Err(err) => {
                eprintln!("jobsh: {}", err);
                1
            }
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

/// `Some` when the line is a single pipe-free stage whose command word is
/// a built-in. Built-ins inside pipelines run in their stage's child
/// instead.
fn top_level_builtin(tokens: &[Token]) -> Option<builtins::Builtin> {
    if tokens.iter().any(|t| matches!(t, Token::Pipe)) {
        return None;
    }
    builtins::lookup(tokens.first()?.word()?)
}
