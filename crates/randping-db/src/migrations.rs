use rusqlite::Connection;
use tracing::info;

use crate::DbError;

pub fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, pings)");
        // User references are SET NULL on delete: reaping an account must
        // never remove or block the ping history.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                          TEXT PRIMARY KEY,
                creation_finalized          INTEGER NOT NULL DEFAULT 0,
                country                     TEXT,
                notification_subscription   TEXT,
                next_allowed_ping_timestamp INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE pings (
                id                          TEXT PRIMARY KEY,
                from_user                   TEXT REFERENCES users(id) ON DELETE SET NULL,
                to_user                     TEXT REFERENCES users(id) ON DELETE SET NULL,
                reply_to                    TEXT REFERENCES pings(id),
                display_country_of_origin   INTEGER NOT NULL DEFAULT 1,
                timestamp                   INTEGER NOT NULL,
                state                       TEXT NOT NULL DEFAULT 'waiting'
            );

            CREATE INDEX idx_pings_state ON pings(state);
            CREATE INDEX idx_pings_reply_to ON pings(reply_to);
            CREATE INDEX idx_users_finalized ON users(creation_finalized);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
