use crate::controller::{AskRequest, TurnController};
use crate::memory::render_transcript;
use crate::session::TenantIdentity;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, PartialEq)]
enum Input {
    Question(String),
    History,
    Export(PathBuf),
    Unknown(String),
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Question(line.to_string()));
    };
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));
    Some(match (name, arg) {
        ("history", _) => Input::History,
        ("export", path) if !path.is_empty() => Input::Export(PathBuf::from(path)),
        _ => Input::Unknown(line.to_string()),
    })
}

pub async fn run(
    controller: &TurnController,
    tenant: &str,
    user: &str,
    max_matching_docs: i64,
) -> anyhow::Result<()> {
    let identity = TenantIdentity::new(tenant, user)?;
    println!("Tenant ID: {}    User: {}", tenant, user);
    println!("Ask me a question and I will consult the knowledge base to answer...");
    println!("(/history shows this conversation, /export <file> saves it)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(input) = parse_input(&line) else {
            continue;
        };

        match input {
            Input::Question(question) => {
                let request = AskRequest {
                    max_matching_docs,
                    verbose: true,
                    ..AskRequest::new(question, identity.as_str())
                };
                match controller.handle(&request).await {
                    Ok(response) => {
                        let sources = response.sources.unwrap_or_default();
                        println!("{}\n\nSources: {:?}\n", response.answer, sources);
                    }
                    Err(e) => {
                        warn!(error = %e, "turn failed");
                        println!("{}\n", e);
                    }
                }
            }
            Input::History => match controller.transcript(&identity) {
                Ok(turns) if turns.is_empty() => println!("No conversation yet.\n"),
                Ok(turns) => print!("{}", render_transcript(&turns)),
                Err(e) => {
                    warn!(error = %e, "history unavailable");
                    println!("{}\n", e);
                }
            },
            Input::Export(path) => {
                let written = controller
                    .transcript(&identity)
                    .map_err(anyhow::Error::from)
                    .and_then(|turns| {
                        std::fs::write(&path, render_transcript(&turns))?;
                        Ok(turns.len())
                    });
                match written {
                    Ok(turns) => {
                        info!(path = %path.display(), turns, "transcript exported");
                        println!("Saved {} turns to {}\n", turns, path.display());
                    }
                    Err(e) => {
                        warn!(error = %e, "export failed");
                        println!("{}\n", e);
                    }
                }
            }
            Input::Unknown(command) => println!("Unknown command: {}\n", command),
        }
    }
    Ok(())
}
