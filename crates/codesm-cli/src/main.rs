//! Thin terminal front end: one message on the command line runs a single
//! turn and exits; with no message it reads lines from stdin, one turn per
//! line, until EOF. No reedline, no slash commands, no config UI — those
//! are explicitly out of scope here, the facade does the real work.

use clap::Parser;
use codesm::{Agent, AgentConfig};
use futures::StreamExt;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "codesm", about = "Interactive coding agent")]
struct Args {
    /// One-shot message. Omit to read turns from stdin instead.
    message: Option<String>,

    /// Working directory the agent operates in. Defaults to the current directory.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Resume an existing session instead of starting a new one.
    #[arg(long)]
    session: Option<String>,

    /// Model alias or `<provider>/<model>` identifier for the main loop.
    #[arg(long, default_value = "smart")]
    model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let cwd = match args.cwd {
        Some(cwd) => cwd,
        None => std::env::current_dir()?,
    };

    let agent = Agent::new(AgentConfig::new(cwd).with_model_alias(args.model)).await?;

    let session_id = match args.session {
        Some(id) => id,
        None => agent.new_session().await?,
    };

    if let Some(message) = args.message {
        run_turn(&agent, &session_id, message).await?;
        agent.cleanup().await;
        return Ok(());
    }

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        run_turn(&agent, &session_id, line).await?;
    }

    agent.cleanup().await;
    Ok(())
}

async fn run_turn(agent: &Agent, session_id: &str, message: String) -> anyhow::Result<()> {
    let mut stream = agent.chat(session_id, message).await?;
    let stdout = io::stdout();

    while let Some(chunk) = stream.next().await {
        match chunk {
            codesm_core::StreamChunk::Text { text } => {
                let mut handle = stdout.lock();
                write!(handle, "{text}")?;
                handle.flush()?;
            }
            codesm_core::StreamChunk::ToolCall { name, .. } => {
                eprintln!("[tool call: {name}]");
            }
            codesm_core::StreamChunk::ToolCallDelta { .. } => {}
            codesm_core::StreamChunk::ToolResult { name, .. } => {
                eprintln!("[tool result: {name}]");
            }
            codesm_core::StreamChunk::Error { message } => {
                eprintln!("error: {message}");
            }
        }
    }
    println!();
    Ok(())
}
