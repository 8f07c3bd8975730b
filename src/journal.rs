use crate::models::{Direction, Position};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{create_dir_all, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Append-only JSONL trade journal, one object per order action.
///
/// Together with the tracing output this reconstructs the full audit
/// trail of trading decisions. Journal failures are logged and swallowed,
/// a full disk must not stop trading.
pub struct Journal {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    timestamp: DateTime<Utc>,
    event: &'static str,
    symbol: &'a str,
    direction: Direction,
    price: f64,
    volume: f64,
    ticket: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    profit: Option<f64>,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn record_entry(&self, position: &Position, client_id: Uuid) {
        self.append(&JournalRecord {
            timestamp: Utc::now(),
            event: "entry",
            symbol: &position.symbol,
            direction: position.direction,
            price: position.entry_price,
            volume: position.volume,
            ticket: position.ticket,
            client_id: Some(client_id),
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            profit: None,
        });
    }

    pub fn record_exit(&self, position: &Position, close_price: f64, profit: f64) {
        self.append(&JournalRecord {
            timestamp: Utc::now(),
            event: "exit",
            symbol: &position.symbol,
            direction: position.direction,
            price: close_price,
            volume: position.volume,
            ticket: position.ticket,
            client_id: None,
            stop_loss: None,
            take_profit: None,
            profit: Some(profit),
        });
    }

    fn append(&self, record: &JournalRecord<'_>) {
        if let Err(e) = self.try_append(record) {
            tracing::warn!(path = %self.path.display(), error = %e, "journal write failed");
        }
    }

    fn try_append(&self, record: &JournalRecord<'_>) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                create_dir_all(dir)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}
