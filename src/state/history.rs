use chrono::{TimeZone, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::data::{Artifact, CardId, CardRecord};
use crate::error::{DeckError, Result};

/// Notification sent to subscribers whenever the number of cards changes.
///
/// Delivery is at-least-once: consumers must handle the same length twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryChanged {
    pub len: usize,
}

/// The History manages the SQLite card database.
/// Cards are listed newest first; index 0 is the most recent card.
pub struct History {
    conn: Connection,
    db_path: Option<PathBuf>,
    subscribers: Vec<UnboundedSender<HistoryChanged>>,
}

impl History {
    /// Open the history in the user's data directory.
    ///
    /// - Linux: ~/.local/share/concept-deck/history.db
    /// - macOS: ~/Library/Application Support/concept-deck/history.db
    /// - Windows: %APPDATA%\concept-deck\history.db
    pub fn open_default() -> Result<Self> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or(DeckError::NoDataDir)?;
        path.push("concept-deck");
        std::fs::create_dir_all(&path)?;
        path.push("history.db");
        Ok(Self::open(&path)?)
    }

    /// Open or create a history database at `path`
    pub fn open(path: &Path) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        let history = Self::with_connection(conn, Some(path.to_path_buf()))?;
        log::info!("📁 History database opened at: {} ({} cards)", path.display(), history.len()?);
        Ok(history)
    }

    /// Open a throwaway in-memory history
    #[cfg(test)]
    pub fn open_in_memory() -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, None)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> SqlResult<Self> {
        let history = History {
            conn,
            db_path,
            subscribers: Vec::new(),
        };
        history.init_schema()?;
        Ok(history)
    }

    /// Create the cards table and its ordering index if they don't exist.
    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS cards (
                id              TEXT PRIMARY KEY,
                title           TEXT NOT NULL,
                subtitle        TEXT NOT NULL DEFAULT '',
                description     TEXT NOT NULL DEFAULT '',
                image_url       TEXT,
                created_at      INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cards_created_at
             ON cards(created_at DESC)",
            [],
        )?;

        log::debug!("history schema ready");
        Ok(())
    }

    /// Register for change notifications.
    ///
    /// Receivers that are dropped are pruned on the next change.
    pub fn subscribe(&mut self) -> UnboundedReceiver<HistoryChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Tell every live subscriber about a committed change
    fn notify(&mut self, len: usize) {
        let change = HistoryChanged { len };
        self.subscribers.retain(|tx| tx.send(change).is_ok());
    }

    /// Number of cards in the history
    pub fn len(&self) -> SqlResult<usize> {
        count_cards(&self.conn)
    }

    /// All cards, newest first
    pub fn list(&self) -> SqlResult<Vec<CardRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, subtitle, description, image_url, created_at
             FROM cards ORDER BY created_at DESC, rowid DESC",
        )?;

        let cards = stmt
            .query_map([], read_card)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(cards)
    }

    /// Look up a single card
    #[cfg(test)]
    pub fn get(&self, id: CardId) -> SqlResult<Option<CardRecord>> {
        use rusqlite::OptionalExtension;

        self.conn
            .query_row(
                "SELECT id, title, subtitle, description, image_url, created_at
                 FROM cards WHERE id = ?1",
                params![id.to_string()],
                read_card,
            )
            .optional()
    }

    /// Store a newly generated artifact as the newest card
    pub fn append(&mut self, artifact: Artifact) -> SqlResult<CardRecord> {
        let record = CardRecord::new(artifact);
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO cards (id, title, subtitle, description, image_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.artifact.title,
                record.artifact.subtitle,
                record.artifact.description,
                record.artifact.image_url,
                record.created_at.timestamp_millis(),
            ],
        )?;
        let len = count_cards(&tx)?;
        tx.commit()?;

        log::info!("➕ Added card {} ({})", record.id, record.artifact.title);
        self.notify(len);
        Ok(record)
    }

    /// Remove a card by id.
    ///
    /// Returns false when no such card exists; subscribers are only
    /// notified when a row was actually deleted. The delete and the new
    /// count commit together, so an error means the card is still there.
    pub fn remove(&mut self, id: CardId) -> SqlResult<bool> {
        let tx = self.conn.transaction()?;
        let deleted = tx.execute("DELETE FROM cards WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            log::warn!("card {id} was already gone");
            return Ok(false);
        }
        let len = count_cards(&tx)?;
        tx.commit()?;

        log::info!("🗑️  Removed card {id}");
        self.notify(len);
        Ok(true)
    }

    /// Remove every card. Returns how many were deleted.
    pub fn clear(&mut self) -> SqlResult<usize> {
        let deleted = self.conn.execute("DELETE FROM cards", [])?;
        log::info!("🧹 Cleared {deleted} cards");
        self.notify(0);
        Ok(deleted)
    }
}

fn count_cards(conn: &Connection) -> SqlResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

fn read_card(row: &Row<'_>) -> SqlResult<CardRecord> {
    let id: String = row.get(0)?;
    let id = CardId::parse(&id).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })?;
    let created_ms: i64 = row.get(5)?;

    Ok(CardRecord {
        id,
        artifact: Artifact {
            title: row.get(1)?,
            subtitle: row.get(2)?,
            description: row.get(3)?,
            image_url: row.get(4)?,
        },
        created_at: Utc
            .timestamp_millis_opt(created_ms)
            .single()
            .unwrap_or_default(),
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("db_path", &self.db_path)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
