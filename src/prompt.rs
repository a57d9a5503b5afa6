//! Prompt rendering for the interactive loop.

use std::env;

/// `user@host cwd $ `, with $HOME shortened to `~`.
pub(crate) fn render() -> String {
    let user = env::var("USER").unwrap_or_default();
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cwd = env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| String::from("?"));
    let cwd = match env::var("HOME") {
        Ok(home) if cwd.starts_with(&home) => cwd.replacen(&home, "~", 1),
        _ => cwd,
    };
    format!("{}@{} {} $ ", user, host, cwd)
}
