use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use serde::Serialize;

use crate::error::{Error, Result};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    embedding BLOB NOT NULL
);
";

/// One enrolled identity: a name and its embedding.
/// Names are not unique; repeated enrollments accumulate as separate records.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonRecord {
    pub id: i64,
    pub name: String,
    pub embedding: Vec<f32>,
}

/// `{id, name}` projection for the listing endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
}

/// Durable registry of enrolled faces.
///
/// Opened once at startup and shared by reference. Appends are serialized
/// through the connection lock; reads see a consistent snapshot of committed
/// appends. Embeddings are stored as raw little-endian f32 bytes.
pub struct FaceStore {
    conn: Mutex<Connection>,
}

impl FaceStore {
    /// Opens (or creates) the store at the given sqlite path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("creating {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store. Data is lost on drop; suitable for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Persists a (name, embedding) pair and returns the stored record with
    /// its assigned id. Empty names and empty embeddings are rejected.
    pub fn append(&self, name: &str, embedding: &[f32]) -> Result<PersonRecord> {
        if name.is_empty() {
            return Err(Error::Validation("name must not be empty"));
        }
        if embedding.is_empty() {
            return Err(Error::Validation("embedding must not be empty"));
        }

        let blob = embedding_to_blob(embedding);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO persons (name, embedding) VALUES (?1, ?2)",
            params![name, blob],
        )?;
        Ok(PersonRecord {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            embedding: embedding.to_vec(),
        })
    }

    /// Every stored record, in insertion order.
    pub fn all(&self) -> Result<Vec<PersonRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name, embedding FROM persons ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Vec<u8>>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, blob) = row?;
            records.push(PersonRecord {
                id,
                name,
                embedding: blob_to_embedding(&blob)?,
            });
        }
        Ok(records)
    }

    /// All enrolled identities as `{id, name}`, ordered by name.
    pub fn persons(&self) -> Result<Vec<Person>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id, name FROM persons ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Person {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut persons = Vec::new();
        for row in rows {
            persons.push(row?);
        }
        Ok(persons)
    }
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return Err(Error::Internal(format!(
            "embedding blob length {} is not a multiple of 4",
            blob.len()
        )));
    }
    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}
