//! Persisted room cache: the steady-state source of truth for the rooms a
//! client knows about.
//!
//! Reads are served synchronously from an in-memory mirror; writes go through
//! sqlite first and are then announced on a broadcast feed as full
//! authoritative snapshots. Background sync and room controllers both mutate
//! the cache only through [`RoomCache::upsert`] / [`RoomCache::remove`],
//! which keeps the mirror, the database and the feed consistent.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{PoisonError, RwLock},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use shared::domain::{RoleEntry, RoomId, RoomRecord, RoomType};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use tokio::sync::broadcast;
use tracing::info;

const CHANGE_FEED_CAPACITY: usize = 256;

/// One cache mutation, broadcast to every subscriber. `room: None` means the
/// record was removed; otherwise it is the full record after the write.
#[derive(Debug, Clone)]
pub struct CacheChange {
    pub rid: RoomId,
    pub room: Option<RoomRecord>,
}

pub struct RoomCache {
    pool: Pool<Sqlite>,
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
    changes: broadcast::Sender<CacheChange>,
}

impl RoomCache {
    pub async fn open(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let rooms = load_all_rooms(&pool).await?;
        info!(rooms = rooms.len(), "cache: opened room cache");

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            pool,
            rooms: RwLock::new(rooms),
            changes,
        })
    }

    /// Current snapshot for one room, served from the in-memory mirror.
    pub fn room(&self, rid: &RoomId) -> Option<RoomRecord> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(rid)
            .cloned()
    }

    pub fn contains(&self, rid: &RoomId) -> bool {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(rid)
    }

    /// Subscribe to the cache-wide change feed. Mutations are delivered in
    /// write order; a lagged receiver should re-read [`RoomCache::room`],
    /// which always holds the full current state.
    pub fn changes(&self) -> broadcast::Receiver<CacheChange> {
        self.changes.subscribe()
    }

    /// Insert or replace a room record and announce the new snapshot.
    pub async fn upsert(&self, room: RoomRecord) -> Result<()> {
        persist_room(&self.pool, &room).await?;
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room.rid.clone(), room.clone());
        let _ = self.changes.send(CacheChange {
            rid: room.rid.clone(),
            room: Some(room),
        });
        Ok(())
    }

    /// Delete a room record. Subscribers observe the removal as a `None`
    /// snapshot, the "left room" transition.
    pub async fn remove(&self, rid: &RoomId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM rooms WHERE rid = ?")
            .bind(rid.as_str())
            .execute(&self.pool)
            .await?
            .rows_affected()
            > 0;
        let mirrored = self
            .rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(rid)
            .is_some();

        if deleted || mirrored {
            let _ = self.changes.send(CacheChange {
                rid: rid.clone(),
                room: None,
            });
        }
        Ok(deleted || mirrored)
    }
}

async fn load_all_rooms(pool: &Pool<Sqlite>) -> Result<HashMap<RoomId, RoomRecord>> {
    let rows = sqlx::query(
        "SELECT rid, name, kind, read_only, favorite, archived, blocked, blocker,
                alert, unread, user_mentions, last_seen, roles, muted
         FROM rooms",
    )
    .fetch_all(pool)
    .await?;

    let mut rooms = HashMap::with_capacity(rows.len());
    for row in rows {
        let room = room_from_row(&row)?;
        rooms.insert(room.rid.clone(), room);
    }
    Ok(rooms)
}

fn room_from_row(row: &SqliteRow) -> Result<RoomRecord> {
    let roles: Vec<RoleEntry> =
        serde_json::from_str(&row.get::<String, _>(12)).context("invalid roles column")?;
    let muted: Vec<String> =
        serde_json::from_str(&row.get::<String, _>(13)).context("invalid muted column")?;

    Ok(RoomRecord {
        rid: RoomId::new(row.get::<String, _>(0)),
        name: row.get::<String, _>(1),
        kind: RoomType::from_tag(&row.get::<String, _>(2)),
        read_only: row.get::<bool, _>(3),
        favorite: row.get::<bool, _>(4),
        archived: row.get::<bool, _>(5),
        blocked: row.get::<bool, _>(6),
        blocker: row.get::<bool, _>(7),
        alert: row.get::<bool, _>(8),
        unread: row.get::<i64, _>(9) as u32,
        user_mentions: row.get::<i64, _>(10) as u32,
        last_seen: row.get::<Option<DateTime<Utc>>, _>(11),
        roles,
        muted,
    })
}

async fn persist_room(pool: &Pool<Sqlite>, room: &RoomRecord) -> Result<()> {
    let roles = serde_json::to_string(&room.roles).context("failed to encode roles")?;
    let muted = serde_json::to_string(&room.muted).context("failed to encode muted")?;

    sqlx::query(
        "INSERT INTO rooms (rid, name, kind, read_only, favorite, archived, blocked, blocker,
                            alert, unread, user_mentions, last_seen, roles, muted, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(rid) DO UPDATE SET
            name = excluded.name,
            kind = excluded.kind,
            read_only = excluded.read_only,
            favorite = excluded.favorite,
            archived = excluded.archived,
            blocked = excluded.blocked,
            blocker = excluded.blocker,
            alert = excluded.alert,
            unread = excluded.unread,
            user_mentions = excluded.user_mentions,
            last_seen = excluded.last_seen,
            roles = excluded.roles,
            muted = excluded.muted,
            updated_at = CURRENT_TIMESTAMP",
    )
    .bind(room.rid.as_str())
    .bind(&room.name)
    .bind(room.kind.as_tag())
    .bind(room.read_only)
    .bind(room.favorite)
    .bind(room.archived)
    .bind(room.blocked)
    .bind(room.blocker)
    .bind(room.alert)
    .bind(room.unread as i64)
    .bind(room.user_mentions as i64)
    .bind(room.last_seen)
    .bind(roles)
    .bind(muted)
    .execute(pool)
    .await?;
    Ok(())
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_file_path(database_url) else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create cache directory '{}' for '{database_url}'",
                parent.display()
            )
        })?;
    }
    Ok(())
}

fn sqlite_file_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return None;
    }
    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
