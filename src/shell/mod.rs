//! Session shell: the interactive REPL and one-shot runner

pub mod commands;
pub mod repl;
pub mod session;

pub use commands::{SessionUsage, ShellCommand};
pub use repl::{run_interactive, run_once, write_output};
pub use session::{Reply, Session, TaskStatus};
