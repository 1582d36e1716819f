//! Interactive loop and one-shot task execution

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, warn};

use super::commands::ShellCommand;
use super::session::{Reply, Session, TaskStatus};

/// Directory one-shot output is copied into, when set
pub const OUTPUT_DIR_ENV: &str = "HARNESS_OUTPUT_DIR";
/// File stem for the copied output
pub const JOB_ID_ENV: &str = "HARNESS_JOB_ID";

/// Exit status for a one-shot task
pub const EXIT_ANSWER: i32 = 0;
pub const EXIT_TRANSPORT: i32 = 1;
pub const EXIT_EXHAUSTED: i32 = 2;
pub const EXIT_INTERRUPTED: i32 = 130;

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a handler the task simply runs to completion
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Read tasks and commands from stdin until `/quit` or EOF.
///
/// Ctrl-C abandons the running task or command; at the prompt it only
/// reminds the user how to leave.
pub async fn run_interactive(mut session: Session) -> io::Result<()> {
    println!("\nHarness - Local Code Agent");
    println!("Model: {}", session.config().chat_model);
    println!("Type /help for commands\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!(">>> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupted() => {
                println!("\nInterrupted. Type /quit to exit.");
                continue;
            }
        };

        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = ShellCommand::parse(input) {
            match session.handle_command(command, interrupted()).await {
                Reply::Quit => {
                    println!("Goodbye!");
                    break;
                }
                Reply::Continue(text) => println!("{}\n", text),
                Reply::Interrupted => println!("\nInterrupted.\n"),
            }
            continue;
        }

        match session.run_task(input, interrupted()).await {
            TaskStatus::Finished(run) => println!("\n{}\n", run.outcome),
            TaskStatus::Interrupted => println!("\nInterrupted. The task was discarded.\n"),
            TaskStatus::Failed(e) => {
                error!(error = %e, "Task failed");
                println!("\nError: {}\n", e);
            }
        }
    }

    Ok(())
}

/// Run a single task and map its outcome to a process exit status
pub async fn run_once(session: &mut Session, task: &str) -> i32 {
    match session.run_task(task, interrupted()).await {
        TaskStatus::Finished(run) => {
            let text = run.outcome.to_string();
            println!("{}", text);
            save_job_output(&text);
            if run.outcome.is_answer() {
                EXIT_ANSWER
            } else {
                EXIT_EXHAUSTED
            }
        }
        TaskStatus::Failed(e) => {
            eprintln!("Error: {}", e);
            EXIT_TRANSPORT
        }
        TaskStatus::Interrupted => {
            eprintln!("Interrupted");
            EXIT_INTERRUPTED
        }
    }
}

fn save_job_output(content: &str) {
    let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) else {
        return;
    };
    let job_id = std::env::var(JOB_ID_ENV).unwrap_or_else(|_| "unknown".to_string());
    match write_output(Path::new(&dir), &job_id, content) {
        Ok(path) => eprintln!("Output saved to {}", path.display()),
        Err(e) => warn!(dir = %dir, error = %e, "Failed to save output"),
    }
}

/// Write `content` to `<dir>/<job_id>.txt`
pub fn write_output(dir: &Path, job_id: &str, content: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.txt", job_id));
    std::fs::write(&path, content)?;
    Ok(path)
}
