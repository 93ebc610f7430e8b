use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;

use async_trait::async_trait;
use lcx_types::{LedgerChanges, LedgerRange};
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{StreamError, StreamResult};
use crate::source::ChangeSource;

/// Replays a pre-recorded sequence of ledgers.
///
/// Used for tests, fixtures, and exporting from change files captured from
/// a replay engine. Ledgers below the prepared range start are skipped and
/// the source stops after the range end.
#[derive(Clone, Debug, Default)]
pub struct ReplayChangeSource {
    ledgers: VecDeque<LedgerChanges>,
    end: Option<u32>,
}

impl ReplayChangeSource {
    pub fn new(ledgers: Vec<LedgerChanges>) -> Self {
        Self {
            ledgers: ledgers.into(),
            end: None,
        }
    }

    /// Parse one JSON [`LedgerChanges`] object per line. Blank lines are
    /// ignored.
    pub fn from_json_lines<R: BufRead>(reader: R) -> StreamResult<Self> {
        let mut ledgers = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            if let Some(ledger) = parse_line(index, &line?)? {
                ledgers.push(ledger);
            }
        }
        Ok(Self::new(ledgers))
    }

    pub fn open(path: &Path) -> StreamResult<Self> {
        let file = File::open(path)?;
        Self::from_json_lines(BufReader::new(file))
    }

    /// Ledgers not yet handed out.
    pub fn remaining(&self) -> usize {
        self.ledgers.len()
    }
}

#[async_trait]
impl ChangeSource for ReplayChangeSource {
    async fn prepare(&mut self, range: LedgerRange) -> StreamResult<()> {
        let before = self.ledgers.len();
        self.ledgers.retain(|l| l.sequence >= range.start());
        self.end = range.end();
        debug!(
            skipped = before - self.ledgers.len(),
            remaining = self.ledgers.len(),
            "replay source prepared"
        );
        Ok(())
    }

    async fn next_ledger(&mut self) -> StreamResult<Option<LedgerChanges>> {
        match self.ledgers.front() {
            Some(ledger) if self.end.is_some_and(|end| ledger.sequence > end) => Ok(None),
            _ => Ok(self.ledgers.pop_front()),
        }
    }
}

/// One JSON-lines record; `index` is zero-based.
fn parse_line(index: usize, line: &str) -> StreamResult<Option<LedgerChanges>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| StreamError::Malformed {
            line: index + 1,
            reason: e.to_string(),
        })
}

/// A source fed over a channel, typically by the task that drives a live
/// replay engine process.
///
/// `next_ledger` waits for the feeder; dropping the sender ends the source.
/// Ledgers below the prepared range start are skipped.
#[derive(Debug)]
pub struct ChannelChangeSource {
    rx: mpsc::Receiver<StreamResult<LedgerChanges>>,
    start: u32,
}

impl ChannelChangeSource {
    /// Create a source and the sender that feeds it.
    pub fn new(capacity: usize) -> (mpsc::Sender<StreamResult<LedgerChanges>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, start: 0 })
    }

    /// Feed a source from JSON lines parsed on a dedicated reader thread,
    /// such as a replay engine's output piped to stdin. A malformed line ends
    /// the feed with an error. The thread is detached so a reader blocked on
    /// input never holds up shutdown.
    pub fn spawn_json_lines<R>(reader: R, capacity: usize) -> StreamResult<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, source) = Self::new(capacity);
        thread::Builder::new()
            .name("lcx-json-lines".into())
            .spawn(move || {
                for (index, line) in reader.lines().enumerate() {
                    let parsed = line
                        .map_err(StreamError::from)
                        .and_then(|line| parse_line(index, &line));
                    let item = match parsed {
                        Ok(None) => continue,
                        Ok(Some(ledger)) => Ok(ledger),
                        Err(err) => Err(err),
                    };
                    let failed = item.is_err();
                    if tx.blocking_send(item).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(source)
    }
}

#[async_trait]
impl ChangeSource for ChannelChangeSource {
    async fn prepare(&mut self, range: LedgerRange) -> StreamResult<()> {
        self.start = range.start();
        Ok(())
    }

    async fn next_ledger(&mut self) -> StreamResult<Option<LedgerChanges>> {
        while let Some(item) = self.rx.recv().await {
            match item {
                Ok(ledger) if ledger.sequence < self.start => continue,
                other => return other.map(Some),
            }
        }
        Ok(None)
    }
}
