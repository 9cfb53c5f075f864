/// Database row types.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// User record in the users table
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// Column list matching `User` field order, for SELECT statements.
pub const USER_COLUMNS: &str = "id, name, roll_no, email, password_hash, created_at";

impl User {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            roll_no: row.get(2)?,
            email: row.get(3)?,
            password_hash: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// Column list for the outpasses table, in `OutpassRecord` field order.
pub const OUTPASS_COLUMNS: &str =
    "id, user_id, purpose, destination, date_out, return_time, status, access_token, created_at";
