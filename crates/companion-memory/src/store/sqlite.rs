//! SQLite-backed memory store.
//!
//! One row per memory. List-valued fields are stored as JSON text and
//! timestamps as epoch milliseconds.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;

use super::MemoryStore;
use crate::error::{Error, Result};
use crate::types::{Memory, MemoryCategory};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding_json TEXT,
    importance REAL NOT NULL,
    confidence REAL NOT NULL,
    strength REAL,
    recall_difficulty REAL NOT NULL,
    context_relevance REAL NOT NULL,
    emotional_valence REAL NOT NULL,
    arousal REAL NOT NULL,
    dominant_emotion TEXT,
    emotion_intensity REAL,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    reinforcement_count INTEGER NOT NULL DEFAULT 0,
    related_entities_json TEXT NOT NULL DEFAULT '[]',
    related_characters_json TEXT NOT NULL DEFAULT '[]',
    tags_json TEXT NOT NULL DEFAULT '[]',
    source TEXT NOT NULL DEFAULT '',
    is_forgotten INTEGER NOT NULL DEFAULT 0,
    expires_at INTEGER
);
CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);
CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);
";

const COLUMNS: &str = "id, category, content, embedding_json, importance, confidence, strength, \
    recall_difficulty, context_relevance, emotional_valence, arousal, dominant_emotion, \
    emotion_intensity, created_at, last_accessed_at, timestamp, access_count, reinforcement_count, \
    related_entities_json, related_characters_json, tags_json, source, is_forgotten, expires_at";

/// Memory store persisting to SQLite
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Open (or create) a database file and run the schema migration
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_memory(row: &Row) -> rusqlite::Result<Memory> {
        let category: String = row.get(1)?;
        let category = category
            .parse::<MemoryCategory>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into()))?;

        let embedding: Option<String> = row.get(3)?;
        let embedding = embedding.map(|json| from_json(3, &json)).transpose()?;

        let expires_at: Option<i64> = row.get(23)?;

        Ok(Memory {
            id: row.get(0)?,
            category,
            content: row.get(2)?,
            embedding,
            importance: row.get(4)?,
            confidence: row.get(5)?,
            strength: row.get(6)?,
            recall_difficulty: row.get(7)?,
            context_relevance: row.get(8)?,
            emotional_valence: row.get(9)?,
            arousal: row.get(10)?,
            dominant_emotion: row.get(11)?,
            emotion_intensity: row.get(12)?,
            created_at: from_millis(13, row.get(13)?)?,
            last_accessed_at: from_millis(14, row.get(14)?)?,
            timestamp: from_millis(15, row.get(15)?)?,
            access_count: row.get(16)?,
            reinforcement_count: row.get(17)?,
            related_entities: from_json(18, &row.get::<_, String>(18)?)?,
            related_characters: from_json(19, &row.get::<_, String>(19)?)?,
            tags: from_json(20, &row.get::<_, String>(20)?)?,
            source: row.get(21)?,
            is_forgotten: row.get(22)?,
            expires_at: expires_at.map(|ms| from_millis(23, ms)).transpose()?,
        })
    }

    /// Encode the JSON columns of a memory: embedding, entities, characters, tags
    fn json_columns(memory: &Memory) -> Result<(Option<String>, String, String, String)> {
        let embedding = memory.embedding.as_ref().map(serde_json::to_string).transpose()?;
        Ok((
            embedding,
            serde_json::to_string(&memory.related_entities)?,
            serde_json::to_string(&memory.related_characters)?,
            serde_json::to_string(&memory.tags)?,
        ))
    }
}

fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {}", millis).into(),
        )
    })
}

fn from_json<T: serde::de::DeserializeOwned>(idx: usize, json: &str) -> rusqlite::Result<T> {
    serde_json::from_str(json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn get_all_memories(&self) -> Result<Vec<Memory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories ORDER BY created_at, id",
            COLUMNS
        ))?;
        let memories = stmt
            .query_map([], Self::row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(memories)
    }

    async fn get_memory_by_id(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.conn.lock().await;
        let memory = conn
            .query_row(
                &format!("SELECT {} FROM memories WHERE id = ?1", COLUMNS),
                params![id],
                Self::row_to_memory,
            )
            .optional()?;
        Ok(memory)
    }

    async fn save_memory(&self, memory: Memory) -> Result<String> {
        let (embedding, entities, characters, tags) = Self::json_columns(&memory)?;
        let conn = self.conn.lock().await;

        conn.execute(
            &format!(
                "INSERT INTO memories ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, \
                 ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                COLUMNS
            ),
            params![
                &memory.id,
                memory.category.as_str(),
                &memory.content,
                embedding,
                memory.importance,
                memory.confidence,
                memory.strength,
                memory.recall_difficulty,
                memory.context_relevance,
                memory.emotional_valence,
                memory.arousal,
                &memory.dominant_emotion,
                memory.emotion_intensity,
                memory.created_at.timestamp_millis(),
                memory.last_accessed_at.timestamp_millis(),
                memory.timestamp.timestamp_millis(),
                memory.access_count,
                memory.reinforcement_count,
                entities,
                characters,
                tags,
                &memory.source,
                memory.is_forgotten,
                memory.expires_at.map(|t| t.timestamp_millis()),
            ],
        )?;

        Ok(memory.id)
    }

    async fn update_memory(&self, memory: Memory) -> Result<()> {
        let (embedding, entities, characters, tags) = Self::json_columns(&memory)?;
        let conn = self.conn.lock().await;

        let changed = conn.execute(
            "UPDATE memories SET category = ?2, content = ?3, embedding_json = ?4, importance = ?5,
                confidence = ?6, strength = ?7, recall_difficulty = ?8, context_relevance = ?9,
                emotional_valence = ?10, arousal = ?11, dominant_emotion = ?12, emotion_intensity = ?13,
                created_at = ?14, last_accessed_at = ?15, timestamp = ?16, access_count = ?17,
                reinforcement_count = ?18, related_entities_json = ?19, related_characters_json = ?20,
                tags_json = ?21, source = ?22, is_forgotten = ?23, expires_at = ?24
             WHERE id = ?1",
            params![
                &memory.id,
                memory.category.as_str(),
                &memory.content,
                embedding,
                memory.importance,
                memory.confidence,
                memory.strength,
                memory.recall_difficulty,
                memory.context_relevance,
                memory.emotional_valence,
                memory.arousal,
                &memory.dominant_emotion,
                memory.emotion_intensity,
                memory.created_at.timestamp_millis(),
                memory.last_accessed_at.timestamp_millis(),
                memory.timestamp.timestamp_millis(),
                memory.access_count,
                memory.reinforcement_count,
                entities,
                characters,
                tags,
                &memory.source,
                memory.is_forgotten,
                memory.expires_at.map(|t| t.timestamp_millis()),
            ],
        )?;

        if changed == 0 {
            return Err(Error::not_found("Memory", memory.id));
        }
        Ok(())
    }

    async fn delete_memory(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    async fn search_memories(
        &self,
        query: &str,
        category: Option<MemoryCategory>,
    ) -> Result<Vec<Memory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memories
             WHERE instr(lower(content), lower(?1)) > 0 AND (?2 IS NULL OR category = ?2)
             ORDER BY created_at, id",
            COLUMNS
        ))?;
        let memories = stmt
            .query_map(params![query, category.map(|c| c.as_str())], Self::row_to_memory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(memories)
    }
}
