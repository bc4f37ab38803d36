//! SQL schema for the Kubera SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS healthcare_providers (
    provider_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS payors (
    payor_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- References into the external document store; file bytes never live here.
CREATE TABLE IF NOT EXISTS documents (
    document_id INTEGER PRIMARY KEY AUTOINCREMENT,
    filename    TEXT NOT NULL,
    file_path   TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS contracts (
    contract_id             INTEGER PRIMARY KEY AUTOINCREMENT,
    provider_id             INTEGER NOT NULL REFERENCES healthcare_providers(provider_id),
    payor_id                INTEGER NOT NULL REFERENCES payors(payor_id),
    document_id             INTEGER NOT NULL REFERENCES documents(document_id),
    effective_date          TEXT NOT NULL,   -- YYYY-MM-DD
    termination_date        TEXT NOT NULL,   -- YYYY-MM-DD
    termination_notice_days INTEGER,
    stop_loss_threshold     TEXT NOT NULL,   -- decimal string
    created_at              TEXT NOT NULL,
    CHECK (effective_date < termination_date)
);

-- The materialised current value of each term. term_value is only NULL
-- inside the transaction that introduces the term. version counts the
-- amendments that have touched the term, including ones that kept its value.
CREATE TABLE IF NOT EXISTS contract_terms (
    term_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id     INTEGER NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    term_name       TEXT NOT NULL,
    term_value      TEXT,
    inception_value TEXT,
    version         INTEGER NOT NULL DEFAULT 0,
    introduced_at   TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    UNIQUE (contract_id, term_name)
);

CREATE TABLE IF NOT EXISTS amendments (
    amendment_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    contract_id    INTEGER NOT NULL REFERENCES contracts(contract_id) ON DELETE CASCADE,
    document_id    INTEGER NOT NULL REFERENCES documents(document_id),
    amendment_date TEXT NOT NULL,
    created_at     TEXT NOT NULL
);

-- Append-only revision log.
CREATE TABLE IF NOT EXISTS contract_term_revisions (
    revision_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    term_id      INTEGER NOT NULL REFERENCES contract_terms(term_id) ON DELETE CASCADE,
    amendment_id INTEGER NOT NULL REFERENCES amendments(amendment_id) ON DELETE CASCADE,
    prev_value   TEXT,
    new_value    TEXT NOT NULL,
    changed_at   TEXT NOT NULL   -- RFC 3339, fixed-width UTC
);

CREATE TRIGGER IF NOT EXISTS contract_term_revisions_immutable
BEFORE UPDATE ON contract_term_revisions
BEGIN
    SELECT RAISE(ABORT, 'contract_term_revisions is append-only');
END;

CREATE INDEX IF NOT EXISTS contracts_provider_idx ON contracts(provider_id);
CREATE INDEX IF NOT EXISTS contracts_payor_idx    ON contracts(payor_id);
CREATE INDEX IF NOT EXISTS amendments_contract_idx ON amendments(contract_id, amendment_date);
CREATE INDEX IF NOT EXISTS revisions_term_idx     ON contract_term_revisions(term_id, changed_at);

PRAGMA user_version = 1;
";
