use chrono::Utc;
use uuid::Uuid;

use crate::auth::password;
use crate::db::models::{User, USER_COLUMNS};
use crate::db::DbPool;
use crate::error::ServiceError;

/// User accounts backed by the `users` table.
///
/// All methods are blocking; async callers run them in `spawn_blocking`.
#[derive(Clone)]
pub struct IdentityStore {
    db: DbPool,
}

impl IdentityStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create an account. Names and roll numbers are trimmed, emails are
    /// lowercased. Fails with `Validation` when a field is empty or when the
    /// email or roll number is already registered.
    pub fn create_user(
        &self,
        name: &str,
        roll_no: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ServiceError> {
        let name = name.trim();
        let roll_no = roll_no.trim();
        let email = email.trim().to_lowercase();

        if name.is_empty() || roll_no.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ServiceError::Validation(
                "Name, roll number, email and password are required".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(ServiceError::Validation("Invalid email address".to_string()));
        }

        let password_hash = password::hash_password(password)
            .map_err(|e| ServiceError::Storage(format!("Password hash: {}", e)))?;

        let conn = self
            .db
            .lock()
            .map_err(|e| ServiceError::Storage(format!("DB lock: {}", e)))?;

        // Uniqueness check and insert happen under the same lock
        if find_by_email_or_roll_number_locked(&conn, &email, roll_no)?.is_some() {
            return Err(ServiceError::Validation(
                "Email or Roll No already registered".to_string(),
            ));
        }

        let user = User {
            id: Uuid::now_v7().to_string(),
            name: name.to_string(),
            roll_no: roll_no.to_string(),
            email,
            password_hash,
            created_at: Utc::now().to_rfc3339(),
        };

        conn.execute(
            "INSERT INTO users (id, name, roll_no, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                user.id,
                user.name,
                user.roll_no,
                user.email,
                user.password_hash,
                user.created_at
            ],
        )?;

        Ok(user)
    }

    pub fn find_by_email_or_roll_number(
        &self,
        email: &str,
        roll_no: &str,
    ) -> Result<Option<User>, ServiceError> {
        let conn = self
            .db
            .lock()
            .map_err(|e| ServiceError::Storage(format!("DB lock: {}", e)))?;
        find_by_email_or_roll_number_locked(&conn, &email.trim().to_lowercase(), roll_no.trim())
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let conn = self
            .db
            .lock()
            .map_err(|e| ServiceError::Storage(format!("DB lock: {}", e)))?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))?;
        let mut rows = stmt.query_map([email.trim().to_lowercase()], User::from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Look up by email and check the password. `Unauthorized` covers both an
    /// unknown email and a wrong password.
    pub fn verify_password(&self, email: &str, password: &str) -> Result<User, ServiceError> {
        match self.find_by_email(email)? {
            Some(user) if password::verify_password(password, &user.password_hash) => Ok(user),
            _ => Err(ServiceError::Unauthorized("Invalid credentials".to_string())),
        }
    }

    pub fn actor_exists(&self, user_id: &str) -> Result<bool, ServiceError> {
        let conn = self
            .db
            .lock()
            .map_err(|e| ServiceError::Storage(format!("DB lock: {}", e)))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn find_by_email_or_roll_number_locked(
    conn: &rusqlite::Connection,
    email: &str,
    roll_no: &str,
) -> Result<Option<User>, ServiceError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE email = ?1 OR roll_no = ?2 LIMIT 1",
        USER_COLUMNS
    ))?;
    let mut rows = stmt.query_map(rusqlite::params![email, roll_no], User::from_row)?;
    Ok(rows.next().transpose()?)
}
