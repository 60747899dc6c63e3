//! SQLite store for accounts, content items, review batches and proposed
//! actions.
//!
//! Uses `rusqlite` synchronously; callers hold the handle behind a mutex and
//! never across an await point. Rows are never deleted, so the action table
//! doubles as the audit trail.

use chrono::{SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::errors::LedgerError;
use super::types::{
    Account, ActionDetail, ActionKind, BatchDetails, ContentItem, ContentSource, NewContentItem,
    ProposedAction, ReviewBatch, ReviewStatus,
};

const ACCOUNT_COLUMNS: &str = "id, name, email, refresh_token, is_active, created_at";

const ITEM_COLUMNS: &str = "id, account_id, source, external_id, title, snippet, full_content,
    sender, url, metadata, category, summary, sensitivity_flag, ai_provider_used,
    created_at, processed_at";

const BATCH_COLUMNS: &str =
    "id, account_id, status, batch_summary, item_count, created_at, reviewed_at";

const ACTION_COLUMNS: &str = "id, batch_id, content_item_id, action_type, action_params, reason,
    approved, executed, executed_at, error";

/// Outcome of one executed action, written back by [`LedgerDatabase::record_outcomes`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub action_id: i64,
    pub error: Option<String>,
}

// ─── Database ───────────────────────────────────────────────────────────────

/// SQLite handle for the review ledger.
pub struct LedgerDatabase {
    pub(crate) conn: Connection,
}

impl LedgerDatabase {
    /// Open (or create) the ledger at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self { conn };
        db.create_tables()?;
        tracing::debug!(path, "ledger database opened");
        Ok(db)
    }

    fn create_tables(&self) -> Result<(), LedgerError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                refresh_token TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS content_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                source TEXT NOT NULL,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL DEFAULT '',
                snippet TEXT NOT NULL DEFAULT '',
                full_content TEXT,
                sender TEXT,
                url TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                category TEXT,
                summary TEXT,
                sensitivity_flag INTEGER NOT NULL DEFAULT 0,
                ai_provider_used TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_items_external
                ON content_items(account_id, external_id);

            CREATE TABLE IF NOT EXISTS review_batches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                batch_summary TEXT NOT NULL DEFAULT '',
                item_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                reviewed_at TEXT,
                FOREIGN KEY (account_id) REFERENCES accounts(id)
            );

            CREATE INDEX IF NOT EXISTS idx_batches_account_status
                ON review_batches(account_id, status);

            CREATE TABLE IF NOT EXISTS proposed_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                batch_id INTEGER NOT NULL,
                content_item_id INTEGER NOT NULL,
                action_type TEXT NOT NULL,
                action_params TEXT NOT NULL DEFAULT '{}',
                reason TEXT NOT NULL DEFAULT '',
                approved INTEGER,
                executed INTEGER NOT NULL DEFAULT 0,
                executed_at TEXT,
                error TEXT,
                FOREIGN KEY (batch_id) REFERENCES review_batches(id),
                FOREIGN KEY (content_item_id) REFERENCES content_items(id)
            );

            CREATE INDEX IF NOT EXISTS idx_actions_batch
                ON proposed_actions(batch_id, approved, executed);
            ",
        )?;
        Ok(())
    }

    // ─── Accounts ───────────────────────────────────────────────────────

    pub fn create_account(
        &self,
        name: &str,
        email: &str,
        refresh_token: Option<&str>,
    ) -> Result<i64, LedgerError> {
        self.conn.execute(
            "INSERT INTO accounts (name, email, refresh_token, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, email, refresh_token, now()],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!(account_id = id, "account created");
        Ok(id)
    }

    pub fn get_account(&self, account_id: i64) -> Result<Option<Account>, LedgerError> {
        let account = self
            .conn
            .query_row(
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                params![account_id],
                row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    pub fn list_active_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active = 1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_account)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?);
        }
        Ok(accounts)
    }

    /// Rotate the account's credential, or revoke it with `None`.
    pub fn set_refresh_token(
        &self,
        account_id: i64,
        refresh_token: Option<&str>,
    ) -> Result<(), LedgerError> {
        let updated = self.conn.execute(
            "UPDATE accounts SET refresh_token = ?2 WHERE id = ?1",
            params![account_id, refresh_token],
        )?;
        if updated == 0 {
            return Err(LedgerError::AccountNotFound { account_id });
        }
        tracing::info!(account_id, revoked = refresh_token.is_none(), "refresh token updated");
        Ok(())
    }

    pub fn deactivate_account(&self, account_id: i64) -> Result<(), LedgerError> {
        let updated = self.conn.execute(
            "UPDATE accounts SET is_active = 0 WHERE id = ?1",
            params![account_id],
        )?;
        if updated == 0 {
            return Err(LedgerError::AccountNotFound { account_id });
        }
        Ok(())
    }

    // ─── Content Items ──────────────────────────────────────────────────

    pub fn insert_content_item(&self, item: &NewContentItem) -> Result<i64, LedgerError> {
        insert_item(&self.conn, item)
    }

    pub fn get_content_item(&self, item_id: i64) -> Result<Option<ContentItem>, LedgerError> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = ?1"),
                params![item_id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    // ─── Batches ────────────────────────────────────────────────────────

    pub fn get_batch(&self, batch_id: i64) -> Result<Option<ReviewBatch>, LedgerError> {
        Ok(query_batch(&self.conn, batch_id)?)
    }

    /// A batch with its actions, each joined with its content item.
    pub fn get_batch_details(&self, batch_id: i64) -> Result<Option<BatchDetails>, LedgerError> {
        let Some(batch) = self.get_batch(batch_id)? else {
            return Ok(None);
        };
        let mut actions = Vec::new();
        for action in self.list_actions(batch_id)? {
            let item = self.get_content_item(action.content_item_id)?;
            actions.push(ActionDetail { action, item });
        }
        Ok(Some(BatchDetails { batch, actions }))
    }

    /// Pending batches of an account, newest first.
    pub fn list_pending_batches(&self, account_id: i64) -> Result<Vec<ReviewBatch>, LedgerError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BATCH_COLUMNS} FROM review_batches
             WHERE account_id = ?1 AND status = 'pending'
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![account_id], row_to_batch)?;

        let mut batches = Vec::new();
        for row in rows {
            batches.push(row?);
        }
        Ok(batches)
    }

    // ─── Actions ────────────────────────────────────────────────────────

    pub fn get_action(&self, action_id: i64) -> Result<Option<ProposedAction>, LedgerError> {
        let action = self
            .conn
            .query_row(
                &format!("SELECT {ACTION_COLUMNS} FROM proposed_actions WHERE id = ?1"),
                params![action_id],
                row_to_action,
            )
            .optional()?;
        Ok(action)
    }

    /// Every action of a batch, in insertion order.
    pub fn list_actions(&self, batch_id: i64) -> Result<Vec<ProposedAction>, LedgerError> {
        query_actions(
            &self.conn,
            &format!(
                "SELECT {ACTION_COLUMNS} FROM proposed_actions WHERE batch_id = ?1 ORDER BY id ASC"
            ),
            batch_id,
        )
    }

    /// Actions the executor may run: approved, not yet executed, in a
    /// reviewed batch. A pending batch yields nothing.
    pub fn executable_actions(&self, batch_id: i64) -> Result<Vec<ProposedAction>, LedgerError> {
        let batch = self
            .get_batch(batch_id)?
            .ok_or(LedgerError::BatchNotFound { batch_id })?;
        if batch.status == ReviewStatus::Pending {
            return Ok(Vec::new());
        }
        query_actions(
            &self.conn,
            &format!(
                "SELECT {ACTION_COLUMNS} FROM proposed_actions
                 WHERE batch_id = ?1 AND approved = 1 AND executed = 0
                 ORDER BY id ASC"
            ),
            batch_id,
        )
    }

    /// Mark actions executed, with their errors, in one transaction.
    ///
    /// Actions already executed are left untouched. Returns the number of
    /// rows updated.
    pub fn record_outcomes(&mut self, outcomes: &[ActionOutcome]) -> Result<usize, LedgerError> {
        let tx = self.conn.transaction()?;
        let executed_at = now();
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE proposed_actions SET executed = 1, executed_at = ?2, error = ?3
                 WHERE id = ?1 AND executed = 0",
            )?;
            for outcome in outcomes {
                updated += stmt.execute(params![outcome.action_id, executed_at, outcome.error])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }
}

// ─── Shared Queries ─────────────────────────────────────────────────────────

pub(super) fn insert_item(conn: &Connection, item: &NewContentItem) -> Result<i64, LedgerError> {
    let metadata = serde_json::to_string(&item.metadata)?;
    let created_at = now();
    // Items arriving with a model verdict are already processed.
    let processed_at = (item.category.is_some() || item.summary.is_some())
        .then(|| created_at.clone());
    conn.execute(
        "INSERT INTO content_items
         (account_id, source, external_id, title, snippet, full_content, sender, url,
          metadata, category, summary, sensitivity_flag, ai_provider_used,
          created_at, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            item.account_id,
            item.source.as_str(),
            item.external_id,
            item.title,
            item.snippet,
            item.full_content,
            item.sender,
            item.url,
            metadata,
            item.category,
            item.summary,
            item.sensitivity_flag as i32,
            item.ai_provider_used,
            created_at,
            processed_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn query_batch(
    conn: &Connection,
    batch_id: i64,
) -> rusqlite::Result<Option<ReviewBatch>> {
    conn.query_row(
        &format!("SELECT {BATCH_COLUMNS} FROM review_batches WHERE id = ?1"),
        params![batch_id],
        row_to_batch,
    )
    .optional()
}

fn query_actions(
    conn: &Connection,
    sql: &str,
    batch_id: i64,
) -> Result<Vec<ProposedAction>, LedgerError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![batch_id], row_to_action)?;

    let mut actions = Vec::new();
    for row in rows {
        actions.push(row?);
    }
    Ok(actions)
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Current time as an RFC 3339 string (UTC, second precision).
pub(super) fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        refresh_token: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
        created_at: row.get(5)?,
    })
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ContentItem> {
    Ok(ContentItem {
        id: row.get(0)?,
        account_id: row.get(1)?,
        source: enum_column(row, 2, ContentSource::parse)?,
        external_id: row.get(3)?,
        title: row.get(4)?,
        snippet: row.get(5)?,
        full_content: row.get(6)?,
        sender: row.get(7)?,
        url: row.get(8)?,
        metadata: parse_json_value(row.get::<_, String>(9)?),
        category: row.get(10)?,
        summary: row.get(11)?,
        sensitivity_flag: row.get::<_, i32>(12)? != 0,
        ai_provider_used: row.get(13)?,
        created_at: row.get(14)?,
        processed_at: row.get(15)?,
    })
}

fn row_to_batch(row: &Row<'_>) -> rusqlite::Result<ReviewBatch> {
    Ok(ReviewBatch {
        id: row.get(0)?,
        account_id: row.get(1)?,
        status: enum_column(row, 2, ReviewStatus::parse)?,
        batch_summary: row.get(3)?,
        item_count: row.get(4)?,
        created_at: row.get(5)?,
        reviewed_at: row.get(6)?,
    })
}

fn row_to_action(row: &Row<'_>) -> rusqlite::Result<ProposedAction> {
    Ok(ProposedAction {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        content_item_id: row.get(2)?,
        action_kind: enum_column(row, 3, ActionKind::parse)?,
        action_params: parse_json_value(row.get::<_, String>(4)?),
        reason: row.get(5)?,
        approved: row.get::<_, Option<i32>>(6)?.map(|v| v != 0),
        executed: row.get::<_, i32>(7)? != 0,
        executed_at: row.get(8)?,
        error: row.get(9)?,
    })
}

/// Read a TEXT column holding one of our enum spellings.
fn enum_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized value '{raw}'").into(),
        )
    })
}

fn parse_json_value(json: String) -> serde_json::Value {
    serde_json::from_str(&json).unwrap_or_else(|_| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> LedgerDatabase {
        LedgerDatabase::open(":memory:").unwrap()
    }

    fn bookmark_item(account_id: i64) -> NewContentItem {
        NewContentItem {
            account_id,
            source: ContentSource::Bookmark,
            external_id: "https://tokio.rs".into(),
            title: "Tokio".into(),
            snippet: "An async runtime".into(),
            full_content: None,
            sender: None,
            url: Some("https://tokio.rs".into()),
            metadata: serde_json::json!({"folder": "Reading"}),
            category: Some("tech".into()),
            summary: Some("Async runtime for Rust.".into()),
            sensitivity_flag: false,
            ai_provider_used: Some("cloud".into()),
        }
    }

    #[test]
    fn test_create_and_get_account() {
        let db = test_db();
        let id = db.create_account("Me", "me@example.com", Some("tok-1")).unwrap();

        let account = db.get_account(id).unwrap().unwrap();
        assert_eq!(account.email, "me@example.com");
        assert_eq!(account.refresh_token.as_deref(), Some("tok-1"));
        assert!(account.is_active);
        assert!(account.created_at.ends_with('Z'));
    }

    #[test]
    fn test_account_email_unique() {
        let db = test_db();
        db.create_account("Me", "me@example.com", None).unwrap();
        let err = db.create_account("Other", "me@example.com", None).unwrap_err();
        assert!(matches!(err, LedgerError::DatabaseError { .. }));
    }

    #[test]
    fn test_rotate_and_revoke_refresh_token() {
        let db = test_db();
        let id = db.create_account("Me", "me@example.com", Some("old")).unwrap();

        db.set_refresh_token(id, Some("new")).unwrap();
        assert_eq!(
            db.get_account(id).unwrap().unwrap().refresh_token.as_deref(),
            Some("new")
        );
        db.set_refresh_token(id, None).unwrap();
        assert!(db.get_account(id).unwrap().unwrap().refresh_token.is_none());

        assert!(matches!(
            db.set_refresh_token(999, None),
            Err(LedgerError::AccountNotFound { account_id: 999 })
        ));
    }

    #[test]
    fn test_deactivate_hides_from_active_list() {
        let db = test_db();
        let a = db.create_account("A", "a@example.com", None).unwrap();
        let b = db.create_account("B", "b@example.com", None).unwrap();
        db.deactivate_account(a).unwrap();

        let active = db.list_active_accounts().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b);
    }

    #[test]
    fn test_insert_and_get_content_item() {
        let db = test_db();
        let account = db.create_account("Me", "me@example.com", None).unwrap();
        let id = db.insert_content_item(&bookmark_item(account)).unwrap();

        let item = db.get_content_item(id).unwrap().unwrap();
        assert_eq!(item.source, ContentSource::Bookmark);
        assert_eq!(item.metadata_str("folder"), Some("Reading"));
        assert_eq!(item.ai_provider_used.as_deref(), Some("cloud"));
        assert!(item.processed_at.is_some());
        assert!(db.get_content_item(id + 1).unwrap().is_none());
    }

    #[test]
    fn test_content_item_requires_account() {
        let db = test_db();
        let err = db.insert_content_item(&bookmark_item(42)).unwrap_err();
        assert!(matches!(err, LedgerError::DatabaseError { .. }));
    }

    #[test]
    fn test_missing_batch_and_action() {
        let db = test_db();
        assert!(db.get_batch(1).unwrap().is_none());
        assert!(db.get_batch_details(1).unwrap().is_none());
        assert!(db.get_action(1).unwrap().is_none());
        assert!(matches!(
            db.executable_actions(1),
            Err(LedgerError::BatchNotFound { batch_id: 1 })
        ));
    }

    #[test]
    fn test_corrupt_enum_column_is_an_error() {
        let db = test_db();
        let account = db.create_account("Me", "me@example.com", None).unwrap();
        db.conn
            .execute(
                "INSERT INTO review_batches (account_id, status, created_at) VALUES (?1, 'lost', ?2)",
                params![account, now()],
            )
            .unwrap();
        let id = db.conn.last_insert_rowid();
        assert!(matches!(
            db.get_batch(id),
            Err(LedgerError::DatabaseError { .. })
        ));
    }
}
