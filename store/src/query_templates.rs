//! The five parameterized statement shapes the core issues against a tier
//! table. Every tier lives in its own table; these functions just splice the
//! table name into a fixed shape so the result can be handed to the
//! prepared-statement cache.
//!
//! Multi-tenancy is schema-reserved but unused: every statement pins
//! `tenant=''`.

/// `UPDATE <table> ... SET data = data + ?` — appends to the list column.
pub(crate) fn raw_insert(table: &str) -> String {
    format!(
        "UPDATE {table} USING TTL ? SET data = data + ? WHERE tenant='' AND rollup=? AND period=? AND path=? AND time=?"
    )
}

/// `UPDATE <table> ... SET data = ?` — replaces the list with a singleton.
pub(crate) fn rollup_insert(table: &str) -> String {
    format!(
        "UPDATE {table} USING TTL ? SET data = ? WHERE tenant='' AND rollup=? AND period=? AND path=? AND time=?"
    )
}

/// Multi-path range fetch, inclusive on both ends.
pub(crate) fn range_fetch(table: &str) -> String {
    format!(
        "SELECT path, data, time FROM {table} WHERE path IN ? AND tenant='' AND rollup=? AND period=? AND time>=? AND time<=? ORDER BY time ASC"
    )
}

/// Single-path rollup source fetch, half-open on the upper bound.
pub(crate) fn rollup_fetch(table: &str) -> String {
    format!(
        "SELECT data FROM {table} WHERE path=? AND tenant='' AND rollup=? AND period=? AND time>=? AND time<? ORDER BY time ASC"
    )
}

/// Keyspace selection, issued once at session setup.
#[allow(dead_code)]
pub(crate) fn use_keyspace(keyspace: &str) -> String {
    format!("USE {keyspace}")
}
