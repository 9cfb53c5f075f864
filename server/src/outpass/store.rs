use crate::db::models::OUTPASS_COLUMNS;
use crate::db::DbPool;
use crate::error::ServiceError;

use super::OutpassRecord;

/// Durable storage for outpass records.
///
/// `modify` is the only way to change a stored record: it applies `apply` to
/// the current row and writes back its status and access token as one atomic
/// step for that record id. Concurrent modifications of the same record are
/// serialized; the last writer wins.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: &OutpassRecord) -> Result<(), ServiceError>;

    fn find_by_id(&self, id: &str) -> Result<Option<OutpassRecord>, ServiceError>;

    /// Records owned by `owner_id`, newest first.
    fn find_by_owner(&self, owner_id: &str) -> Result<Vec<OutpassRecord>, ServiceError>;

    /// Returns the updated record, or `None` when no record has this id.
    fn modify(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut OutpassRecord),
    ) -> Result<Option<OutpassRecord>, ServiceError>;
}

/// `RecordStore` over the shared SQLite connection.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: DbPool,
}

impl SqliteRecordStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, ServiceError> {
        self.db
            .lock()
            .map_err(|e| ServiceError::Storage(format!("DB lock: {}", e)))
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert(&self, record: &OutpassRecord) -> Result<(), ServiceError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO outpasses (id, user_id, purpose, destination, date_out, return_time, status, access_token, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                record.id,
                record.owner_id,
                record.purpose,
                record.destination,
                record.date_out,
                record.return_time,
                record.status.as_str(),
                record.access_token,
                record.created_at
            ],
        )?;
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<OutpassRecord>, ServiceError> {
        let conn = self.lock()?;
        find_locked(&conn, id)
    }

    fn find_by_owner(&self, owner_id: &str) -> Result<Vec<OutpassRecord>, ServiceError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM outpasses WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            OUTPASS_COLUMNS
        ))?;
        let records = stmt
            .query_map([owner_id], OutpassRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn modify(
        &self,
        id: &str,
        apply: &mut dyn FnMut(&mut OutpassRecord),
    ) -> Result<Option<OutpassRecord>, ServiceError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let Some(mut record) = find_locked(&tx, id)? else {
            return Ok(None);
        };
        apply(&mut record);

        tx.execute(
            "UPDATE outpasses SET status = ?1, access_token = ?2 WHERE id = ?3",
            rusqlite::params![record.status.as_str(), record.access_token, id],
        )?;
        tx.commit()?;

        Ok(Some(record))
    }
}

fn find_locked(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<OutpassRecord>, ServiceError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM outpasses WHERE id = ?1",
        OUTPASS_COLUMNS
    ))?;
    let mut rows = stmt.query_map([id], OutpassRecord::from_row)?;
    Ok(rows.next().transpose()?)
}
