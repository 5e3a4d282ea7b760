//! System tables - embedded SQL files
//!
//! The tables Ladder itself needs (the preference record holding the schema
//! version, and the upgrade history) are compiled into the binary with
//! include_str! and applied on every open. Every statement must be
//! idempotent (`CREATE ... IF NOT EXISTS`).

/// System table DDL, applied in order.
/// Format: (filename, sql_content)
pub const SYSTEM_TABLES: &[(&str, &str)] = &[
    ("000_preferences.sql", include_str!("000_preferences.sql")),
    ("001_upgrade_history.sql", include_str!("001_upgrade_history.sql")),
];
