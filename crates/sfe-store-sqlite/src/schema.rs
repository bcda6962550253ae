//! SQL schema for the SFE SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS companies (
    company_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    timezone    TEXT NOT NULL,
    currency    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS territories (
    territory_id TEXT PRIMARY KEY,
    company_id   TEXT NOT NULL REFERENCES companies(company_id),
    code         TEXT NOT NULL,
    name         TEXT NOT NULL,
    description  TEXT,
    created_at   TEXT NOT NULL,
    UNIQUE (company_id, code)
);

CREATE TABLE IF NOT EXISTS teams (
    team_id      TEXT PRIMARY KEY,
    company_id   TEXT NOT NULL REFERENCES companies(company_id),
    territory_id TEXT REFERENCES territories(territory_id),
    name         TEXT NOT NULL,
    leader_id    TEXT REFERENCES users(user_id),
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL REFERENCES companies(company_id),
    username      TEXT NOT NULL UNIQUE,
    email         TEXT NOT NULL,
    full_name     TEXT NOT NULL,
    phone         TEXT,
    role          TEXT NOT NULL,     -- 'CEO' | 'SD' | 'SM' | 'MM' | 'PM' | 'SUP' | 'SR'
    territory_id  TEXT REFERENCES territories(territory_id),
    team_id       TEXT REFERENCES teams(team_id),
    manager_id    TEXT REFERENCES users(user_id),
    is_active     INTEGER NOT NULL DEFAULT 1,
    password_hash TEXT NOT NULL,     -- argon2 PHC string
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS customers (
    customer_id     TEXT PRIMARY KEY,
    company_id      TEXT NOT NULL REFERENCES companies(company_id),
    territory_id    TEXT REFERENCES territories(territory_id),
    code            TEXT NOT NULL,
    name            TEXT NOT NULL,
    address         TEXT,
    lat             REAL,
    lng             REAL,
    monthly_revenue REAL NOT NULL DEFAULT 0,
    class           TEXT NOT NULL,   -- 'A' | 'B' | 'C'; derived from monthly_revenue
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL,
    UNIQUE (company_id, code),
    CHECK  ((lat IS NULL) = (lng IS NULL))
);

CREATE TABLE IF NOT EXISTS contacts (
    contact_id  TEXT PRIMARY KEY,
    customer_id TEXT NOT NULL REFERENCES customers(customer_id) ON DELETE CASCADE,
    company_id  TEXT NOT NULL REFERENCES companies(company_id),
    name        TEXT NOT NULL,
    position    TEXT,
    phone       TEXT,
    email       TEXT,
    is_primary  INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- At most one primary contact per customer.
CREATE UNIQUE INDEX IF NOT EXISTS contacts_one_primary_idx
    ON contacts(customer_id) WHERE is_primary = 1;

CREATE TABLE IF NOT EXISTS pre_call_plans (
    plan_id        TEXT PRIMARY KEY,
    company_id     TEXT NOT NULL REFERENCES companies(company_id),
    sr_id          TEXT NOT NULL REFERENCES users(user_id),
    customer_id    TEXT NOT NULL REFERENCES customers(customer_id),
    scheduled_at   TEXT NOT NULL,
    objectives     TEXT NOT NULL,
    notes          TEXT,
    status         TEXT NOT NULL,    -- 'DRAFT' | 'PENDING' | 'APPROVED' | 'REJECTED'
    submitted_at   TEXT,
    reviewer_id    TEXT REFERENCES users(user_id),
    reviewed_at    TEXT,
    review_comment TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS call_reports (
    report_id     TEXT PRIMARY KEY,
    company_id    TEXT NOT NULL REFERENCES companies(company_id),
    sr_id         TEXT NOT NULL REFERENCES users(user_id),
    customer_id   TEXT NOT NULL REFERENCES customers(customer_id),
    plan_id       TEXT REFERENCES pre_call_plans(plan_id),
    summary       TEXT NOT NULL DEFAULT '',
    outcome       TEXT,
    next_steps    TEXT,
    check_in_at   TEXT,
    check_in_lat  REAL,
    check_in_lng  REAL,
    check_out_at  TEXT,
    check_out_lat REAL,
    check_out_lng REAL,
    status        TEXT NOT NULL,     -- 'DRAFT' | 'SUBMITTED'
    submitted_at  TEXT,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- Bytes live on disk under photo_dir; only metadata is stored here.
CREATE TABLE IF NOT EXISTS photos (
    photo_id     TEXT PRIMARY KEY,
    report_id    TEXT NOT NULL REFERENCES call_reports(report_id) ON DELETE CASCADE,
    company_id   TEXT NOT NULL REFERENCES companies(company_id),
    path         TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    media_type   TEXT NOT NULL,
    size_bytes   INTEGER NOT NULL,
    uploaded_by  TEXT NOT NULL REFERENCES users(user_id),
    uploaded_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL REFERENCES users(user_id),
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    body            TEXT NOT NULL,
    subject_id      TEXT,
    is_read         INTEGER NOT NULL DEFAULT 0,
    read_at         TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_preferences (
    user_id          TEXT PRIMARY KEY REFERENCES users(user_id),
    plan_submitted   INTEGER NOT NULL,
    plan_reviewed    INTEGER NOT NULL,
    report_submitted INTEGER NOT NULL,
    email_digest     INTEGER NOT NULL,
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS users_company_idx         ON users(company_id);
CREATE INDEX IF NOT EXISTS customers_company_idx     ON customers(company_id);
CREATE INDEX IF NOT EXISTS contacts_customer_idx     ON contacts(customer_id);
CREATE INDEX IF NOT EXISTS plans_company_sched_idx   ON pre_call_plans(company_id, scheduled_at);
CREATE INDEX IF NOT EXISTS plans_sr_idx              ON pre_call_plans(sr_id);
CREATE INDEX IF NOT EXISTS reports_company_idx       ON call_reports(company_id, created_at);
CREATE INDEX IF NOT EXISTS reports_plan_idx          ON call_reports(plan_id);
CREATE INDEX IF NOT EXISTS photos_report_idx         ON photos(report_id);
CREATE INDEX IF NOT EXISTS photos_hash_idx           ON photos(content_hash);
CREATE INDEX IF NOT EXISTS notifications_user_idx    ON notifications(user_id, created_at);

PRAGMA user_version = 1;
";
