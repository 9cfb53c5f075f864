use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(
        "-- Migration 1: Initial schema

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    roll_no TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE outpasses (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    purpose TEXT NOT NULL,
    destination TEXT NOT NULL,
    date_out TEXT NOT NULL,
    return_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    access_token TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX idx_outpasses_user_created ON outpasses(user_id, created_at);
",
    )])
}
