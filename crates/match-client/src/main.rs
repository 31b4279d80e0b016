//! Terminal front end for the match client.
//!
//! Reads line commands from stdin and prints the session log as it grows.
//! `--find` starts matchmaking right away.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use checkers_core::{Coord, BOARD_SIZE};
use match_client::clients::{http_client, AccountClient, HttpMatchmaker, WsConnector};
use match_client::session::LogEntry;
use match_client::{ClientConfig, MatchDriver, MatchSession, SessionHandle};

const HELP: &str = "commands: find | click <row> <col> | board | log | ping | quit";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Find,
    Click(Coord),
    Board,
    Log,
    Ping,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Err("empty command".into());
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "find" => Command::Find,
        "board" | "b" => Command::Board,
        "log" => Command::Log,
        "ping" => Command::Ping,
        "quit" | "exit" | "q" => Command::Quit,
        "help" | "?" => Command::Help,
        "click" | "c" => {
            let mut number = |name: &str| -> Result<i32, String> {
                words
                    .next()
                    .ok_or_else(|| format!("missing {name}"))?
                    .parse()
                    .map_err(|_| format!("{name} must be a number"))
            };
            let row = number("row")?;
            let col = number("col")?;
            Command::Click(Coord::new(row, col).map_err(|e| e.to_string())?)
        }
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}

/// Board as text. `r`/`b` are men, `R`/`B` kings, `*` marks the selection.
fn render_board(session: &MatchSession) -> String {
    let mut out = String::from("   ");
    for col in 0..BOARD_SIZE {
        out.push_str(&format!(" {col} "));
    }
    out.push('\n');

    for (row, cells) in session.board().rows().enumerate() {
        out.push_str(&format!(" {row} "));
        for cell in cells {
            let glyph = match cell.piece {
                Some(p) => {
                    let c = match p.color {
                        checkers_core::Color::Red => 'r',
                        checkers_core::Color::Black => 'b',
                    };
                    if p.is_king {
                        c.to_ascii_uppercase()
                    } else {
                        c
                    }
                }
                None if cell.playable => '.',
                None => ' ',
            };
            if session.selected() == Some(cell.coord()) {
                out.push_str(&format!("*{glyph}*"));
            } else {
                out.push_str(&format!(" {glyph} "));
            }
        }
        out.push('\n');
    }

    let role = session.role().map(|r| r.to_string()).unwrap_or_else(|| "-".into());
    let turn = session.next_turn().map(|r| r.to_string()).unwrap_or_else(|| "-".into());
    out.push_str(&format!(
        "state={:?} match={} role={role} turn={turn}{}",
        session.state(),
        session.match_id().map(|id| id.to_string()).unwrap_or_else(|| "-".into()),
        if session.forced_chain().is_some() { " (capture chain)" } else { "" },
    ));
    out
}

/// Tracks which log entries were already printed. A new match starts a new
/// log, recognised by a different first entry.
#[derive(Default)]
struct LogCursor {
    first: Option<DateTime<Utc>>,
    printed: usize,
}

impl LogCursor {
    fn fresh<'a>(&mut self, log: &'a [LogEntry]) -> &'a [LogEntry] {
        let first = log.first().map(|e| e.at);
        if first != self.first || log.len() < self.printed {
            self.first = first;
            self.printed = 0;
        }
        let fresh = &log[self.printed..];
        self.printed = log.len();
        fresh
    }
}

async fn print_log(handle: SessionHandle) {
    let mut rx = handle.subscribe();
    let mut cursor = LogCursor::default();

    while rx.changed().await.is_ok() {
        let session = rx.borrow_and_update().clone();
        for entry in cursor.fresh(session.log()) {
            println!("[{}] {}", entry.at.format("%H:%M:%S"), entry.message);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let config = ClientConfig::from_env()?;
    info!(api = %config.api_base_url, ws = %config.ws_base_url, "Config loaded");

    let jar = Arc::new(Jar::default());
    let client = http_client(&config, Arc::clone(&jar))?;

    let account = AccountClient::new(client.clone(), &config);
    match &config.credentials {
        Some(creds) => {
            account.login(&creds.email, &creds.password).await?;
        }
        None => match account.me().await {
            Ok(Some(user)) => info!(username = %user.username, "Using existing session"),
            Ok(None) => warn!("Not logged in; matchmaking may be rejected"),
            Err(e) => warn!(error = %e, "Session check failed"),
        },
    }

    let matchmaker = Arc::new(HttpMatchmaker::new(client, &config));
    let connector = Arc::new(WsConnector::new(&config).with_cookies(jar));
    let driver = MatchDriver::new(matchmaker, connector, config.poll_interval);
    let handle = driver.handle();
    let session_task = tokio::spawn(driver.run());
    tokio::spawn(print_log(handle.clone()));

    if std::env::args().any(|a| a == "--find") {
        handle.find_match()?;
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{e}. {HELP}");
                continue;
            }
        };

        match command {
            Command::Find => handle.find_match()?,
            Command::Click(at) => handle.click(at)?,
            Command::Ping => handle.ping()?,
            Command::Board => println!("{}", render_board(&handle.snapshot())),
            Command::Log => {
                for entry in handle.snapshot().log() {
                    println!("[{}] {}", entry.at.format("%H:%M:%S"), entry.message);
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    handle.leave()?;
    let last = session_task.await?;
    info!(state = ?last.state(), "Bye");
    Ok(())
}
