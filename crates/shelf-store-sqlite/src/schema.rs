//! SQL schema for the Shelf SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'reader',  -- 'reader' | 'admin'
    created_at    TEXT NOT NULL,
    created_by    TEXT,
    modified_at   TEXT,
    modified_by   TEXT
);

CREATE TABLE IF NOT EXISTS books (
    book_id          TEXT PRIMARY KEY,
    title            TEXT NOT NULL,
    author           TEXT NOT NULL,
    genre            TEXT NOT NULL,
    available_copies INTEGER NOT NULL CHECK (available_copies >= 0),
    created_at       TEXT NOT NULL,
    created_by       TEXT,
    modified_at      TEXT,
    modified_by      TEXT
);

-- No foreign keys: a loan may outlive the book it references.
CREATE TABLE IF NOT EXISTS loans (
    loan_id     TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    book_id     TEXT NOT NULL,
    loan_date   TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    return_date TEXT,            -- NULL while the loan is active
    created_at  TEXT NOT NULL,
    created_by  TEXT,
    modified_at TEXT,
    modified_by TEXT
);

-- At most one active loan per (user, book).
CREATE UNIQUE INDEX IF NOT EXISTS loans_active_idx
    ON loans(user_id, book_id) WHERE return_date IS NULL;

CREATE INDEX IF NOT EXISTS loans_user_date_idx ON loans(user_id, loan_date);
CREATE INDEX IF NOT EXISTS books_title_idx     ON books(title);

PRAGMA user_version = 1;
";
