//! SQL schema for the variable catalog.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per variable per survey year. Ids recur across years with
-- different labels, so the year is part of the key.
CREATE TABLE IF NOT EXISTS variables (
    year            INTEGER NOT NULL,
    id              TEXT NOT NULL,
    label           TEXT NOT NULL,
    concept         TEXT NOT NULL DEFAULT '',
    group_id        TEXT NOT NULL DEFAULT '',   -- table id, '' for pseudo-variables
    predicate_type  TEXT NOT NULL DEFAULT '',
    limit_value     TEXT NOT NULL DEFAULT '',
    attributes_json TEXT NOT NULL DEFAULT 'null',
    values_json     TEXT NOT NULL DEFAULT 'null',
    PRIMARY KEY (year, id)
);

-- Append-only log of metadata refreshes.
CREATE TABLE IF NOT EXISTS refreshes (
    refresh_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    year           INTEGER NOT NULL,
    refreshed_at   TEXT NOT NULL,   -- RFC 3339 UTC
    variable_count INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS variables_id_idx      ON variables(id);
CREATE INDEX IF NOT EXISTS variables_label_idx   ON variables(label);
CREATE INDEX IF NOT EXISTS variables_concept_idx ON variables(concept);
CREATE INDEX IF NOT EXISTS variables_group_idx   ON variables(group_id, year);

PRAGMA user_version = 1;
";
