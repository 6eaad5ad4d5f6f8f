//! SQL schema for the parish SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS submission_links (
    link_id          INTEGER PRIMARY KEY AUTOINCREMENT,
    token            TEXT    NOT NULL UNIQUE,
    created_by       TEXT    NOT NULL,
    created_at       TEXT    NOT NULL,
    expires_at       TEXT,              -- NULL never expires
    is_active        INTEGER NOT NULL DEFAULT 1,
    access_count     INTEGER NOT NULL DEFAULT 0 CHECK (access_count >= 0),
    description      TEXT,
    max_submissions  INTEGER,           -- NULL is unlimited
    submission_count INTEGER NOT NULL DEFAULT 0 CHECK (submission_count >= 0)
);

CREATE TABLE IF NOT EXISTS households (
    household_id INTEGER PRIMARY KEY AUTOINCREMENT,
    family_name  TEXT,
    address      TEXT,
    city         TEXT,
    zip_code     TEXT,
    phone_number TEXT,
    email        TEXT
);

CREATE TABLE IF NOT EXISTS parishioners (
    parishioner_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name            TEXT NOT NULL,
    last_name             TEXT NOT NULL,
    name_suffix           TEXT,
    birthday              TEXT,        -- YYYY-MM-DD
    death_date            TEXT,
    email                 TEXT,
    phone_number          TEXT,
    status                TEXT,        -- MembershipStatus
    marital_status        TEXT,        -- MaritalStatus
    marriage_date         TEXT,
    baptismal_name        TEXT,
    patron_saint          TEXT,
    baptism_date          TEXT,
    chrismation_date      TEXT,
    spouse_id             INTEGER REFERENCES parishioners(parishioner_id),
    godfather_id          INTEGER REFERENCES parishioners(parishioner_id),
    godmother_id          INTEGER REFERENCES parishioners(parishioner_id),
    wedding_sponsor_id    INTEGER REFERENCES parishioners(parishioner_id),
    household_id          INTEGER REFERENCES households(household_id),
    manual_spouse_name    TEXT,
    manual_godfather_name TEXT,
    manual_godmother_name TEXT,
    manual_sponsor_name   TEXT,
    CHECK (spouse_id IS NULL OR spouse_id != parishioner_id)
);

-- The visitor's data is a denormalised snapshot held as JSON.
CREATE TABLE IF NOT EXISTS submissions (
    submission_id                INTEGER PRIMARY KEY AUTOINCREMENT,
    link_id                      INTEGER NOT NULL REFERENCES submission_links(link_id),
    submission_type              TEXT    NOT NULL,  -- 'NEW' | 'UPDATE'
    status                       TEXT    NOT NULL,  -- 'PENDING' | 'APPROVED' | 'REJECTED'
    submitted_at                 TEXT    NOT NULL,
    reviewed_at                  TEXT,
    reviewed_by                  TEXT,
    review_notes                 TEXT,
    target_parishioner_id        INTEGER REFERENCES parishioners(parishioner_id),
    pending_spouse_submission_id INTEGER,
    data_json                    TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS links_creator_idx          ON submission_links(created_by);
CREATE INDEX IF NOT EXISTS submissions_status_idx     ON submissions(status, submitted_at);
CREATE INDEX IF NOT EXISTS submissions_link_idx       ON submissions(link_id);
CREATE INDEX IF NOT EXISTS submissions_pending_sp_idx ON submissions(pending_spouse_submission_id);
CREATE INDEX IF NOT EXISTS parishioners_godfather_idx ON parishioners(godfather_id);
CREATE INDEX IF NOT EXISTS parishioners_godmother_idx ON parishioners(godmother_id);

PRAGMA user_version = 1;
";
