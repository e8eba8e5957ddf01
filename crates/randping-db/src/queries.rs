//! SQL for the users and pings tables.
//!
//! Every function takes a plain `&Connection` so callers can compose several
//! of them inside one [`Database::with_transaction`](crate::Database::with_transaction)
//! scope (a `Transaction` derefs to `Connection`).

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use randping_types::models::PingState;

use crate::DbError;
use crate::models::{NewPing, PingRow, UserRow, WaitingPing};

// -- Users --

pub fn insert_user(conn: &Connection, id: &str, country: Option<&str>) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO users (id, creation_finalized, country, next_allowed_ping_timestamp)
         VALUES (?1, 0, ?2, 0)",
        params![id, country],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, creation_finalized, country, notification_subscription, next_allowed_ping_timestamp
         FROM users WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                creation_finalized: row.get(1)?,
                country: row.get(2)?,
                notification_subscription: row.get(3)?,
                next_allowed_ping_timestamp: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Returns the number of rows removed (0 when the user did not exist).
pub fn delete_user(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM users WHERE id = ?1", [id])?)
}

pub fn set_subscription(conn: &Connection, id: &str, subscription: &str) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE users SET notification_subscription = ?1 WHERE id = ?2",
        params![subscription, id],
    )?)
}

pub fn mark_finalized(conn: &Connection, id: &str) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE users SET creation_finalized = 1 WHERE id = ?1",
        [id],
    )?)
}

pub fn set_next_allowed_ping(conn: &Connection, id: &str, timestamp: i64) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE users SET next_allowed_ping_timestamp = ?1 WHERE id = ?2",
        params![timestamp, id],
    )?)
}

pub fn count_finalized_users(conn: &Connection) -> Result<u64, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE creation_finalized = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}

/// The finalized user at `offset` in a stable (id) order.
pub fn finalized_user_at(conn: &Connection, offset: u64) -> Result<Option<String>, DbError> {
    let id = conn
        .query_row(
            "SELECT id FROM users WHERE creation_finalized = 1 ORDER BY id LIMIT 1 OFFSET ?1",
            [offset as i64],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

// -- Pings --

pub fn insert_ping(conn: &Connection, ping: &NewPing<'_>) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO pings (id, from_user, to_user, reply_to, display_country_of_origin, timestamp, state)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ping.id,
            ping.from_user,
            ping.to_user,
            ping.reply_to,
            ping.display_country_of_origin,
            ping.timestamp,
            PingState::Waiting.as_str(),
        ],
    )?;
    Ok(())
}

pub fn get_ping(conn: &Connection, id: &str) -> Result<Option<PingRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, from_user, to_user, reply_to, display_country_of_origin, timestamp, state
         FROM pings WHERE id = ?1",
    )?;

    let row = stmt
        .query_row([id], |row| {
            Ok(PingRow {
                id: row.get(0)?,
                from_user: row.get(1)?,
                to_user: row.get(2)?,
                reply_to: row.get(3)?,
                display_country_of_origin: row.get(4)?,
                timestamp: row.get(5)?,
                state: ping_state(row, 6)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub fn count_replies(conn: &Connection, reply_to: &str) -> Result<u64, DbError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM pings WHERE reply_to = ?1",
        [reply_to],
        |r| r.get(0),
    )?;
    Ok(count as u64)
}

/// All waiting pings, oldest first, with the sender's country and the
/// recipient's subscription. LEFT JOINs keep pings whose users were deleted.
pub fn waiting_pings(conn: &Connection) -> Result<Vec<WaitingPing>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.to_user, p.reply_to, p.display_country_of_origin,
                sender.country, recipient.notification_subscription
         FROM pings p
         LEFT JOIN users sender ON p.from_user = sender.id
         LEFT JOIN users recipient ON p.to_user = recipient.id
         WHERE p.state = ?1
         ORDER BY p.timestamp, p.rowid",
    )?;

    let rows = stmt
        .query_map([PingState::Waiting.as_str()], |row| {
            Ok(WaitingPing {
                id: row.get(0)?,
                to_user: row.get(1)?,
                reply_to: row.get(2)?,
                display_country_of_origin: row.get(3)?,
                sender_country: row.get(4)?,
                recipient_subscription: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Move a waiting ping to `state`. Returns 0 if the ping is missing or
/// already terminal, so a ping is never written twice.
pub fn set_ping_state(conn: &Connection, id: &str, state: PingState) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE pings SET state = ?1 WHERE id = ?2 AND state = ?3",
        params![state.as_str(), id, PingState::Waiting.as_str()],
    )?)
}

fn ping_state(row: &Row<'_>, idx: usize) -> rusqlite::Result<PingState> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
