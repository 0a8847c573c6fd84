use std::collections::HashMap;

use crate::Database;
use crate::models::{CapsuleFilter, CapsuleRow, MediaRow, NewCapsuleRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;
use rusqlite::types::Value;

const CAPSULE_COLUMNS: &str =
    "c.id, c.user_id, c.title, c.body, c.date, c.tags, c.unlock_at, c.created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, email: &str, password_hash: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (email, password_hash) VALUES (?1, ?2)",
                (email, password_hash),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &Value::Text(email.to_string())))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &Value::Integer(id)))
    }

    // -- Capsules --

    /// Insert a capsule and its media rows atomically. Returns the new capsule id.
    pub fn insert_capsule(&self, capsule: &NewCapsuleRow) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO capsules (user_id, title, body, date, tags, unlock_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    capsule.user_id,
                    &capsule.title,
                    &capsule.body,
                    &capsule.date,
                    &capsule.tags,
                    &capsule.unlock_at,
                ],
            )?;
            let capsule_id = tx.last_insert_rowid();

            for (position, media) in capsule.media.iter().enumerate() {
                tx.execute(
                    "INSERT INTO capsule_media (capsule_id, position, reference, content_type, kind, size, sha256)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        capsule_id,
                        position as i64,
                        &media.reference,
                        &media.content_type,
                        media.kind.as_str(),
                        media.size,
                        &media.sha256,
                    ],
                )?;
            }

            tx.commit()?;
            Ok(capsule_id)
        })
    }

    /// Capsules owned by `user_id` matching every filter, newest date first.
    pub fn list_capsules(&self, user_id: i64, filter: &CapsuleFilter) -> Result<Vec<CapsuleRow>> {
        self.with_conn(|conn| {
            let mut clauses = vec!["c.user_id = ?1".to_string()];
            let mut params: Vec<Value> = vec![Value::Integer(user_id)];

            if let Some(tag) = &filter.tag {
                params.push(Value::Text(tag.clone()));
                clauses.push(format!("instr(c.tags, ?{}) > 0", params.len()));
            }
            if let Some(kind) = filter.media_kind {
                params.push(Value::Text(kind.as_str().to_string()));
                clauses.push(format!(
                    "EXISTS (SELECT 1 FROM capsule_media cm WHERE cm.capsule_id = c.id AND cm.kind = ?{})",
                    params.len()
                ));
            }
            if let Some(after) = &filter.after {
                params.push(Value::Text(after.clone()));
                clauses.push(format!("c.date >= ?{}", params.len()));
            }
            if let Some(before) = &filter.before {
                params.push(Value::Text(before.clone()));
                clauses.push(format!("c.date <= ?{}", params.len()));
            }

            let predicate = clauses.join(" AND ");
            let sql = format!(
                "SELECT {} FROM capsules c WHERE {} ORDER BY c.date DESC, c.id DESC",
                CAPSULE_COLUMNS, predicate
            );

            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_capsule)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            if rows.is_empty() {
                return Ok(rows);
            }

            // Same predicate as a subquery: the parameter count stays fixed
            // however many capsules match.
            let mut media = query_media(
                conn,
                &format!("m.capsule_id IN (SELECT c.id FROM capsules c WHERE {})", predicate),
                &params,
            )?;
            for row in &mut rows {
                row.media = media.remove(&row.id).unwrap_or_default();
            }

            Ok(rows)
        })
    }

    /// Owner-scoped lookup. A capsule owned by someone else is indistinguishable
    /// from a missing one.
    pub fn get_capsule(&self, id: i64, user_id: i64) -> Result<Option<CapsuleRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM capsules c WHERE c.id = ?1 AND c.user_id = ?2",
                CAPSULE_COLUMNS
            );
            let row = conn
                .query_row(&sql, rusqlite::params![id, user_id], map_capsule)
                .optional()?;

            let Some(mut row) = row else {
                return Ok(None);
            };
            row.media = query_media(conn, "m.capsule_id = ?1", &[Value::Integer(row.id)])?
                .remove(&row.id)
                .unwrap_or_default();
            Ok(Some(row))
        })
    }

    /// Delete an owned capsule (media rows cascade). Returns false when no row
    /// matched the id + owner pair.
    pub fn delete_capsule(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM capsules WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![id, user_id],
            )?;
            Ok(removed > 0)
        })
    }
}

/// True when the error is a UNIQUE constraint violation (e.g. duplicate email).
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn query_user(conn: &Connection, predicate: &str, value: &Value) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password_hash, created_at FROM users WHERE {}",
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn map_capsule(row: &rusqlite::Row<'_>) -> rusqlite::Result<CapsuleRow> {
    Ok(CapsuleRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        date: row.get(4)?,
        tags: row.get(5)?,
        unlock_at: row.get(6)?,
        created_at: row.get(7)?,
        media: Vec::new(),
    })
}

/// Media rows matching `predicate` (over `capsule_media m`), grouped by capsule
/// in position order.
fn query_media(conn: &Connection, predicate: &str, params: &[Value]) -> Result<HashMap<i64, Vec<MediaRow>>> {
    let sql = format!(
        "SELECT m.capsule_id, m.position, m.reference, m.content_type, m.kind, m.size, m.sha256
         FROM capsule_media m WHERE {}
         ORDER BY m.capsule_id, m.position",
        predicate
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok(MediaRow {
                capsule_id: row.get(0)?,
                position: row.get(1)?,
                reference: row.get(2)?,
                content_type: row.get(3)?,
                kind: row.get(4)?,
                size: row.get(5)?,
                sha256: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut grouped: HashMap<i64, Vec<MediaRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.capsule_id).or_default().push(row);
    }
    Ok(grouped)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
