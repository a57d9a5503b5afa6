//! Built-in commands.
//!
//! Only two exist: `exit` and `cd`. A lone top-level built-in runs in the
//! shell process itself; a built-in appearing as a pipeline stage runs in
//! that stage's child, where it can observe its redirections but cannot
//! affect the shell.

use std::env;
use std::io;
use std::process;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Exit,
    Cd,
}

#[derive(Error, Debug)]
pub enum BuiltinError {
    #[error("exit does not take any parameters")]
    ExitParams,
    #[error("cd: too many parameters")]
    CdParams,
    #[error("cd: HOME not set")]
    HomeUnset,
    #[error("cd: {0}")]
    Chdir(#[from] io::Error),
}

/// Fixed recognition table; anything else execs through the search path.
pub fn lookup(name: &str) -> Option<Builtin> {
    match name {
        "exit" => Some(Builtin::Exit),
        "cd" => Some(Builtin::Cd),
        _ => None,
    }
}

/// Run a built-in. `in_child` marks execution inside a pipeline stage.
pub fn run(builtin: Builtin, args: &[String], in_child: bool) -> Result<(), BuiltinError> {
    match builtin {
        Builtin::Exit => {
            if !args.is_empty() {
                return Err(BuiltinError::ExitParams);
            }
            if in_child {
                // `exit` in a pipeline only ends its own stage.
                return Ok(());
            }
            process::exit(0);
        }
        Builtin::Cd => {
            let dir = match args {
                [] => env::var("HOME").map_err(|_| BuiltinError::HomeUnset)?,
                [dir] => dir.clone(),
                _ => return Err(BuiltinError::CdParams),
            };
            env::set_current_dir(&dir)?;
            Ok(())
        }
    }
}
