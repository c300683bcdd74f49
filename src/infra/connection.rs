use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tracing::debug;

use crate::planner::{Action, Decision, Outcome};
use crate::state::{BotId, WorldSnapshot};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Messages the game harness sends, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Turn { snapshot: Box<WorldSnapshot> },
    Outcomes { results: Vec<Outcome> },
    GameOver { turn: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotAction {
    pub bot_id: BotId,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Actions { turn: i32, actions: Vec<BotAction> },
}

pub struct GameConnection<R, W> {
    lines: Lines<R>,
    writer: W,
    replay_file: Option<ReplayFile>,
}

impl GameConnection<BufReader<Stdin>, Stdout> {
    pub fn stdio(replays_folder: Option<&str>) -> Self {
        let replay_file = replays_folder.and_then(|folder| ReplayFile::new(folder).ok());
        GameConnection::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), replay_file)
    }
}

impl<R, W> GameConnection<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, replay_file: Option<ReplayFile>) -> Self {
        Self {
            lines: reader.lines(),
            writer,
            replay_file,
        }
    }

    /// Next message from the harness. Blank lines are skipped.
    pub async fn receive(&mut self) -> Result<ServerMessage, ConnectionError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Err(ConnectionError::Protocol("connection closed".to_string()));
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(ref mut replay_file) = self.replay_file {
                replay_file.append(line)?;
            }
            return Ok(serde_json::from_str(line)?);
        }
    }

    pub async fn send_actions(&mut self, turn: i32, decisions: &[Decision]) -> Result<(), ConnectionError> {
        let message = ClientMessage::Actions {
            turn,
            actions: decisions
                .iter()
                .map(|d| BotAction {
                    bot_id: d.bot,
                    action: d.action,
                })
                .collect(),
        };
        let line = serde_json::to_string(&message)?;
        debug!("sending {} actions for turn {}", decisions.len(), turn);

        if let Some(ref mut replay_file) = self.replay_file {
            replay_file.append(&line)?;
        }
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

/// Every line exchanged with the harness, in order.
pub struct ReplayFile {
    file: File,
}

impl ReplayFile {
    pub fn new(replays_folder: &str) -> Result<Self, io::Error> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let format = format_description::parse("[year][month][day]-[hour][minute][second]").map_err(io::Error::other)?;
        let date_time_str = now.format(&format).map_err(io::Error::other)?;

        let filename = Path::new(replays_folder).join(format!("brigade - {}.jsonl", date_time_str));

        if let Some(parent) = filename.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = File::create(filename)?;
        Ok(ReplayFile { file })
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()
    }
}
