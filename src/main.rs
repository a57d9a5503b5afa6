//! jobsh - interactive entry point
//!
//! Usage:
//!   jobsh              Start the interactive read loop
//!   jobsh -c "cmd"     Execute a single command line
//!   jobsh script       Execute a script file

mod prompt;

use jobsh::{signals, Shell};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"jobsh {} - a small Unix shell with process-group job control

USAGE:
    jobsh                   Start the interactive read loop
    jobsh -c <command>      Execute a single command line
    jobsh <script>          Execute a script file (# lines are skipped)
    jobsh --help            Show this help message
    jobsh --version         Show version

JOB CONTROL:
    cmd args                Run in the foreground
    cmd args &              Run in the background; prints the job id and
                            process group, announces completion later
    a | b | c               Pipeline; all stages share one process group
    cmd < in > out          Redirect stdin/stdout (one each per stage)

BUILT-INS:
    cd [dir]                Change directory (defaults to $HOME)
    exit                    Leave the shell
"#,
        VERSION
    );
}

fn print_version() {
    println!("jobsh {}", VERSION);
}

#[derive(Default)]
struct Cli {
    help: bool,
    version: bool,
    command: Option<String>,
    script: Option<String>,
}

fn parse_args(args: &[String]) -> Cli {
    let mut cli = Cli::default();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => cli.help = true,
            "-V" | "--version" => cli.version = true,
            "-c" => cli.command = iter.next().cloned(),
            _ => {
                if cli.script.is_none() {
                    cli.script = Some(arg.clone());
                }
            }
        }
    }
    cli
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let cli = parse_args(&args);

    if cli.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if cli.version {
        print_version();
        return ExitCode::SUCCESS;
    }

    signals::install();

    if let Some(cmd) = cli.command {
        return execute_command(&cmd);
    }
    if let Some(script) = cli.script {
        return execute_script(&script);
    }

    match run_repl() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("jobsh: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Announcing completed background jobs is the main loop's job, fed by
/// the engine's (job id, process group) hand-off.
fn announce_finished(shell: &mut Shell) {
    for job in shell.take_finished() {
        println!("[{}] Process group: {} completed", job.job_id, job.pgid);
    }
}

fn execute_command(cmd: &str) -> ExitCode {
    let mut shell = Shell::new();
    let status = shell.run_line(cmd);
    shell.poll_signals();
    announce_finished(&mut shell);
    if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn execute_script(path: &str) -> ExitCode {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("jobsh: {}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    let mut shell = Shell::new();
    let mut status = 0;
    for line in content.lines() {
        shell.poll_signals();
        announce_finished(&mut shell);

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        status = shell.run_line(trimmed);
    }
    shell.poll_signals();
    announce_finished(&mut shell);

    if status == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn history_path() -> Option<PathBuf> {
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".jobsh_history"))
}

fn run_repl() -> rustyline::Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = rl.load_history(path);
    }

    let mut shell = Shell::new();
    loop {
        // Flags raised while a command ran, or while we sat at the
        // prompt, are folded into the job table here.
        shell.poll_signals();
        announce_finished(&mut shell);

        match rl.readline(&prompt::render()) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                shell.run_line(&line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("jobsh: {}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        let _ = rl.save_history(path);
    }
    Ok(())
}
