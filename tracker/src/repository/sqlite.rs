//! SQLite-backed repository
//!
//! Owns the single connection to the grant database. The schema is applied
//! on open, so a missing file becomes an empty store.

use super::{GrantStore, Repository};
use crate::config::StoreLocation;
use crate::errors::{Result, TrackerError};
use crate::lifecycle::{GrantStatus, GrantType};
use crate::model::{DATE_FORMAT, Grant, GrantFilter, GrantNote, Submission};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

/// Embedded schema SQL from GRANTS_SCHEMA.sql
const SCHEMA_SQL: &str = include_str!("../../GRANTS_SCHEMA.sql");

const GRANT_COLUMNS: &str = "id, name, funder, amount, grant_type, status, deadline, \
     requirements, purpose, contacts, assigned_to, award_amount, reporting_dates, notes, \
     rejection_reason, created_at, updated_at";

/// SQLite repository wrapper
pub struct SqliteRepository {
    conn: Connection,
    location: StoreLocation,
}

impl SqliteRepository {
    /// Open the store at `location`, creating it if needed
    pub fn open(location: &StoreLocation, busy_timeout: Duration) -> Result<Self> {
        let conn = match location {
            StoreLocation::InMemory => Connection::open_in_memory()
                .map_err(|e| TrackerError::store_with_source("failed to open in-memory db", e))?,
            StoreLocation::File(path) => Self::open_file(path)?,
        };

        Self::configure(&conn, busy_timeout)?;
        Self::apply_schema(&conn)?;

        tracing::debug!(location = %location.display(), "Grant store initialized");

        Ok(Self {
            conn,
            location: location.clone(),
        })
    }

    /// Open a file-backed store with default settings
    pub fn open_at_path(path: &Path) -> Result<Self> {
        Self::open(
            &StoreLocation::File(path.to_path_buf()),
            crate::config::StoreConfig::default().busy_timeout(),
        )
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        Self::open(&StoreLocation::InMemory, Duration::ZERO)
    }

    fn open_file(path: &Path) -> Result<Connection> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrackerError::store_with_source(
                    format!("failed to create db directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        Connection::open(path).map_err(|e| {
            TrackerError::store_with_source(format!("failed to open db at {}", path.display()), e)
        })
    }

    fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| TrackerError::store_with_source("failed to enable foreign keys", e))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| TrackerError::store_with_source("failed to set busy timeout", e))?;
        Ok(())
    }

    /// Apply the schema to the database
    fn apply_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| TrackerError::store_with_source("failed to apply schema", e))?;
        Ok(())
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    fn store(&self) -> SqliteStore<'_> {
        SqliteStore { conn: &self.conn }
    }

    /// Get grant count (for metrics/debugging)
    pub fn grant_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM grants", [], |row| row.get(0))
            .map_err(|e| TrackerError::store_with_source("failed to count grants", e))
    }

    /// Get submission count across all grants (for metrics/debugging)
    pub fn submission_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))
            .map_err(|e| TrackerError::store_with_source("failed to count submissions", e))
    }
}

impl GrantStore for SqliteRepository {
    fn insert_grant(&self, grant: &Grant) -> Result<()> {
        self.store().insert_grant(grant)
    }

    fn load_grant(&self, id: &str) -> Result<Option<Grant>> {
        self.store().load_grant(id)
    }

    fn save_grant(&self, grant: &Grant) -> Result<bool> {
        self.store().save_grant(grant)
    }

    fn list_grants(&self, filter: &GrantFilter) -> Result<Vec<Grant>> {
        self.store().list_grants(filter)
    }

    fn insert_submission(&self, submission: &Submission) -> Result<()> {
        self.store().insert_submission(submission)
    }

    fn list_submissions(&self, grant_id: &str) -> Result<Vec<Submission>> {
        self.store().list_submissions(grant_id)
    }

    fn insert_note(&self, note: &GrantNote) -> Result<()> {
        self.store().insert_note(note)
    }

    fn list_notes(&self, grant_id: &str) -> Result<Vec<GrantNote>> {
        self.store().list_notes(grant_id)
    }

    fn delete_grant(&self, id: &str) -> Result<bool> {
        self.store().delete_grant(id)
    }
}

impl Repository for SqliteRepository {
    fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn GrantStore) -> Result<T>,
    {
        // IMMEDIATE takes the write lock before the status read.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| TrackerError::store_with_source("failed to begin transaction", e))?;

        let out = match f(&SqliteStore { conn: &tx }) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, "Rolling back grant transaction");
                return Err(e);
            }
        };

        tx.commit()
            .map_err(|e| TrackerError::store_with_source("failed to commit transaction", e))?;
        Ok(out)
    }
}

/// Statement-level access over a connection or an open transaction.
struct SqliteStore<'c> {
    conn: &'c Connection,
}

impl GrantStore for SqliteStore<'_> {
    fn insert_grant(&self, grant: &Grant) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO grants
                    (id, name, funder, amount, grant_type, status, deadline,
                     requirements, purpose, contacts, assigned_to, award_amount,
                     reporting_dates, notes, rejection_reason, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
                params![
                    grant.id,
                    grant.name,
                    grant.funder,
                    grant.amount,
                    grant.grant_type.as_str(),
                    grant.status.as_str(),
                    encode_date(grant.deadline),
                    encode_list(&grant.requirements)?,
                    grant.purpose,
                    encode_list(&grant.contacts)?,
                    grant.assigned_to,
                    grant.award_amount,
                    encode_dates(&grant.reporting_dates)?,
                    grant.notes,
                    grant.rejection_reason,
                    encode_timestamp(grant.created_at),
                    encode_timestamp(grant.updated_at),
                ],
            )
            .map_err(|e| TrackerError::store_with_source("failed to insert grant", e))?;
        Ok(())
    }

    fn load_grant(&self, id: &str) -> Result<Option<Grant>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {GRANT_COLUMNS} FROM grants WHERE id = ?1"),
                params![id],
                GrantRow::from_row,
            )
            .optional()
            .map_err(|e| TrackerError::store_with_source("failed to load grant", e))?;

        row.map(GrantRow::into_grant).transpose()
    }

    fn save_grant(&self, grant: &Grant) -> Result<bool> {
        let updated = self
            .conn
            .execute(
                r#"
                UPDATE grants
                SET name = ?2,
                    funder = ?3,
                    amount = ?4,
                    grant_type = ?5,
                    status = ?6,
                    deadline = ?7,
                    requirements = ?8,
                    purpose = ?9,
                    contacts = ?10,
                    assigned_to = ?11,
                    award_amount = ?12,
                    reporting_dates = ?13,
                    notes = ?14,
                    rejection_reason = ?15,
                    updated_at = ?16
                WHERE id = ?1
                "#,
                params![
                    grant.id,
                    grant.name,
                    grant.funder,
                    grant.amount,
                    grant.grant_type.as_str(),
                    grant.status.as_str(),
                    encode_date(grant.deadline),
                    encode_list(&grant.requirements)?,
                    grant.purpose,
                    encode_list(&grant.contacts)?,
                    grant.assigned_to,
                    grant.award_amount,
                    encode_dates(&grant.reporting_dates)?,
                    grant.notes,
                    grant.rejection_reason,
                    encode_timestamp(grant.updated_at),
                ],
            )
            .map_err(|e| TrackerError::store_with_source("failed to save grant", e))?;
        Ok(updated > 0)
    }

    fn list_grants(&self, filter: &GrantFilter) -> Result<Vec<Grant>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"
                SELECT {GRANT_COLUMNS}
                FROM grants
                WHERE (?1 IS NULL OR status = ?1)
                  AND (?2 IS NULL OR grant_type = ?2)
                  AND (?3 IS NULL OR funder = ?3)
                ORDER BY deadline ASC, name ASC
                "#
            ))
            .map_err(|e| TrackerError::store_with_source("failed to prepare query", e))?;

        let rows = stmt
            .query_map(
                params![
                    filter.status.map(GrantStatus::as_str),
                    filter.grant_type.map(GrantType::as_str),
                    filter.funder.as_deref(),
                ],
                GrantRow::from_row,
            )
            .map_err(|e| TrackerError::store_with_source("failed to query grants", e))?;

        let mut grants = Vec::new();
        for row in rows {
            let row =
                row.map_err(|e| TrackerError::store_with_source("failed to read grant row", e))?;
            grants.push(row.into_grant()?);
        }
        Ok(grants)
    }

    fn insert_submission(&self, submission: &Submission) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO submissions (id, grant_id, submitted_by, documents, notes, submitted_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    submission.id,
                    submission.grant_id,
                    submission.submitted_by,
                    encode_list(&submission.documents)?,
                    submission.notes,
                    encode_timestamp(submission.submitted_at),
                ],
            )
            .map_err(|e| TrackerError::store_with_source("failed to insert submission", e))?;
        Ok(())
    }

    fn list_submissions(&self, grant_id: &str) -> Result<Vec<Submission>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, grant_id, submitted_by, documents, notes, submitted_at
                FROM submissions
                WHERE grant_id = ?1
                ORDER BY submitted_at DESC, rowid DESC
                "#,
            )
            .map_err(|e| TrackerError::store_with_source("failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![grant_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| TrackerError::store_with_source("failed to query submissions", e))?;

        let mut submissions = Vec::new();
        for row in rows {
            let (id, grant_id, submitted_by, documents, notes, submitted_at) = row
                .map_err(|e| TrackerError::store_with_source("failed to read submission row", e))?;
            submissions.push(Submission {
                id,
                grant_id,
                submitted_by,
                documents: decode_list(&documents)?,
                notes,
                submitted_at: decode_timestamp(&submitted_at)?,
            });
        }
        Ok(submissions)
    }

    fn insert_note(&self, note: &GrantNote) -> Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO grant_notes (id, grant_id, content, author, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    note.id,
                    note.grant_id,
                    note.content,
                    note.author,
                    encode_timestamp(note.created_at),
                ],
            )
            .map_err(|e| TrackerError::store_with_source("failed to insert note", e))?;
        Ok(())
    }

    fn list_notes(&self, grant_id: &str) -> Result<Vec<GrantNote>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, grant_id, content, author, created_at
                FROM grant_notes
                WHERE grant_id = ?1
                ORDER BY created_at DESC, rowid DESC
                "#,
            )
            .map_err(|e| TrackerError::store_with_source("failed to prepare query", e))?;

        let rows = stmt
            .query_map(params![grant_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| TrackerError::store_with_source("failed to query notes", e))?;

        let mut notes = Vec::new();
        for row in rows {
            let (id, grant_id, content, author, created_at) =
                row.map_err(|e| TrackerError::store_with_source("failed to read note row", e))?;
            notes.push(GrantNote {
                id,
                grant_id,
                content,
                author,
                created_at: decode_timestamp(&created_at)?,
            });
        }
        Ok(notes)
    }

    fn delete_grant(&self, id: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM grants WHERE id = ?1", params![id])
            .map_err(|e| TrackerError::store_with_source("failed to delete grant", e))?;
        Ok(deleted > 0)
    }
}

/// Raw `grants` row before decoding enums, dates and JSON lists.
struct GrantRow {
    id: String,
    name: String,
    funder: String,
    amount: f64,
    grant_type: String,
    status: String,
    deadline: String,
    requirements: String,
    purpose: String,
    contacts: String,
    assigned_to: String,
    award_amount: Option<f64>,
    reporting_dates: String,
    notes: String,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl GrantRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            funder: row.get(2)?,
            amount: row.get(3)?,
            grant_type: row.get(4)?,
            status: row.get(5)?,
            deadline: row.get(6)?,
            requirements: row.get(7)?,
            purpose: row.get(8)?,
            contacts: row.get(9)?,
            assigned_to: row.get(10)?,
            award_amount: row.get(11)?,
            reporting_dates: row.get(12)?,
            notes: row.get(13)?,
            rejection_reason: row.get(14)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_grant(self) -> Result<Grant> {
        let status = GrantStatus::parse(&self.status).ok_or_else(|| {
            TrackerError::store(format!("grant {} has unknown status {:?}", self.id, self.status))
        })?;
        let grant_type = GrantType::parse(&self.grant_type).ok_or_else(|| {
            TrackerError::store(format!(
                "grant {} has unknown grant type {:?}",
                self.id, self.grant_type
            ))
        })?;
        let reporting_dates = decode_list(&self.reporting_dates)?
            .iter()
            .map(|d| decode_date(d.as_str()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Grant {
            deadline: decode_date(&self.deadline)?,
            requirements: decode_list(&self.requirements)?,
            contacts: decode_list(&self.contacts)?,
            created_at: decode_timestamp(&self.created_at)?,
            updated_at: decode_timestamp(&self.updated_at)?,
            id: self.id,
            name: self.name,
            funder: self.funder,
            amount: self.amount,
            grant_type,
            status,
            purpose: self.purpose,
            assigned_to: self.assigned_to,
            award_amount: self.award_amount,
            reporting_dates,
            notes: self.notes,
            rejection_reason: self.rejection_reason,
        })
    }
}

fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items)
        .map_err(|e| TrackerError::store_with_source("failed to encode list column", e))
}

fn decode_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| TrackerError::store_with_source("failed to decode list column", e))
}

fn encode_dates(dates: &[NaiveDate]) -> Result<String> {
    let raw: Vec<String> = dates.iter().copied().map(encode_date).collect();
    encode_list(&raw)
}

fn encode_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn decode_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| TrackerError::store_with_source(format!("stored date {raw:?} is invalid"), e))
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            TrackerError::store_with_source(format!("stored timestamp {raw:?} is invalid"), e)
        })
}
