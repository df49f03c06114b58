//! SQLite-backed question store.
//!
//! The connection sits behind a mutex; the pipeline runs a single worker so
//! the lock is never contended in practice, and no guard is held across an
//! await point.
//!
//! Queries run synchronously inside the async methods and briefly block the
//! runtime thread. Each one is a single statement against a local file,
//! and nothing else runs concurrently with the sequential worker.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use super::traits::QuestionStore;
use super::types::*;
use crate::db::DatabaseError;

const RECORD_COLUMNS: &str =
    "id, statement, alternatives, statement_images, subject, board, year, agency, active";

pub struct SqliteQuestionStore {
    conn: Mutex<Connection>,
}

impl SqliteQuestionStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

/// `(statement LIKE ?1 OR statement LIKE ?2 ...) AND active = 0`
fn corruption_predicate(tokens: &[&str]) -> (String, Vec<Value>) {
    let clauses: Vec<String> = (1..=tokens.len())
        .map(|i| format!("statement LIKE ?{i} ESCAPE '\\'"))
        .collect();
    let patterns = tokens
        .iter()
        .map(|t| Value::Text(format!("%{}%", escape_like(t))))
        .collect();
    let predicate = if clauses.is_empty() {
        "0".to_string()
    } else {
        format!("({})", clauses.join(" OR "))
    };
    (format!("{predicate} AND active = 0"), patterns)
}

fn escape_like(token: &str) -> String {
    token
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(CorruptedRecord, Option<String>)> {
    let alternatives_raw: Option<String> = row.get(2)?;
    let record = CorruptedRecord {
        id: row.get(0)?,
        statement: row.get(1)?,
        alternatives: None,
        images: row.get(3)?,
        metadata: RecordMetadata {
            subject: row.get(4)?,
            board: row.get(5)?,
            year: row.get(6)?,
            agency: row.get(7)?,
        },
        active: row.get::<_, i64>(8)? != 0,
    };
    Ok((record, alternatives_raw))
}

/// Polluted rows may hold anything in `alternatives`; keep unparsable text
/// as a JSON string rather than failing the fetch.
fn attach_alternatives(mut record: CorruptedRecord, raw: Option<String>) -> CorruptedRecord {
    record.alternatives = raw.map(|text| {
        serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text))
    });
    record
}

#[async_trait]
impl QuestionStore for SqliteQuestionStore {
    async fn list_corrupted(
        &self,
        tokens: &[&str],
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CorruptedRecord>, DatabaseError> {
        let (predicate, mut patterns) = corruption_predicate(tokens);
        let limit_idx = patterns.len() + 1;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM questions WHERE {predicate}
             ORDER BY id ASC LIMIT ?{limit_idx} OFFSET ?{}",
            limit_idx + 1
        );
        patterns.push(Value::Integer(i64::from(limit)));
        patterns.push(Value::Integer(i64::from(offset)));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(patterns.iter()), record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            let (record, raw) = row?;
            records.push(attach_alternatives(record, raw));
        }
        Ok(records)
    }

    async fn count_corrupted(&self, tokens: &[&str]) -> Result<u64, DatabaseError> {
        let (predicate, patterns) = corruption_predicate(tokens);
        let sql = format!("SELECT COUNT(*) FROM questions WHERE {predicate}");
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&sql, params_from_iter(patterns.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn fetch(&self, id: i64) -> Result<Option<CorruptedRecord>, DatabaseError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM questions WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], record_from_row)?;
        match rows.next() {
            Some(row) => {
                let (record, raw) = row?;
                Ok(Some(attach_alternatives(record, raw)))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, id: i64, update: &RecordUpdate) -> Result<(), DatabaseError> {
        let alternatives_json = serde_json::to_string(&update.alternatives).map_err(|e| {
            DatabaseError::MalformedJson {
                field: "alternatives".to_string(),
                reason: e.to_string(),
            }
        })?;
        let images_json = if update.images.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&update.images).map_err(|e| DatabaseError::MalformedJson {
                field: "statement_images".to_string(),
                reason: e.to_string(),
            })?)
        };
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE questions
             SET statement = ?1,
                 alternatives = ?2,
                 statement_images = COALESCE(?3, statement_images),
                 active = ?4,
                 cleanup_note = ?5,
                 cleaned_at = ?6
             WHERE id = ?7",
            params![
                update.content,
                alternatives_json,
                images_json,
                update.active as i64,
                update.note,
                Utc::now(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity_type: "question".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::pipeline::cleanup::signature::CORRUPTION_SIGNATURE;

    pub(crate) fn memory_store() -> SqliteQuestionStore {
        SqliteQuestionStore::new(open_memory_database().expect("Failed to open in-memory DB"))
    }

    pub(crate) fn insert_question(store: &SqliteQuestionStore, id: i64, statement: Option<&str>, active: bool) {
        let conn = store.lock().unwrap();
        conn.execute(
            "INSERT INTO questions (id, statement, alternatives, statement_images, subject, board, year, agency, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                statement,
                r#"[{"letter":"A","text":"<span ng-bind>x</span>"}]"#,
                Option::<String>::None,
                "Direito Administrativo",
                "CEBRASPE",
                2023,
                "TCU",
                active as i64
            ],
        )
        .unwrap();
    }

    pub(crate) fn stored_row(store: &SqliteQuestionStore, id: i64) -> (String, String, Option<String>, bool, Option<String>) {
        let conn = store.lock().unwrap();
        conn.query_row(
            "SELECT statement, alternatives, statement_images, active, cleanup_note FROM questions WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get::<_, i64>(3)? != 0, row.get(4)?)),
        )
        .unwrap()
    }

    fn update(active: bool, images: Vec<String>) -> RecordUpdate {
        RecordUpdate {
            content: "Texto limpo".to_string(),
            alternatives: vec![Alternative { letter: "C".into(), text: "Certo".into() }],
            images,
            active,
            note: "High confidence in cleanup".to_string(),
        }
    }

    #[tokio::test]
    async fn lists_only_inactive_corrupted_in_id_order() {
        let store = memory_store();
        insert_question(&store, 3, Some("<li ng-repeat=\"a\">x</li>"), false);
        insert_question(&store, 1, Some("<div ng-if=\"b\">y</div>"), false);
        insert_question(&store, 2, Some("clean text"), false);
        insert_question(&store, 4, Some("<!-- ngIf: x -->"), true);
        insert_question(&store, 5, None, false);

        let records = store.list_corrupted(CORRUPTION_SIGNATURE, 10, 0).await.unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(records[0].metadata.board.as_deref(), Some("CEBRASPE"));
        assert!(records[0].alternatives.as_ref().unwrap().is_array());
    }

    #[tokio::test]
    async fn paginates_with_limit_and_offset() {
        let store = memory_store();
        for id in 1..=5 {
            insert_question(&store, id, Some("ng-if"), false);
        }
        let page = store.list_corrupted(CORRUPTION_SIGNATURE, 2, 2).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn like_matching_ignores_case() {
        let store = memory_store();
        insert_question(&store, 1, Some("<DIV NG-IF=\"x\">"), false);
        assert_eq!(store.count_corrupted(CORRUPTION_SIGNATURE).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn wildcard_characters_in_tokens_are_literal() {
        let store = memory_store();
        insert_question(&store, 1, Some("vmXquestao"), false);
        assert_eq!(store.count_corrupted(&["vm_questao"]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counts_match_listing() {
        let store = memory_store();
        insert_question(&store, 1, Some("ng-if"), false);
        insert_question(&store, 2, Some("ng-repeat"), false);
        insert_question(&store, 3, Some("ng-if"), true);
        assert_eq!(store.count_corrupted(CORRUPTION_SIGNATURE).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn fetch_missing_returns_none() {
        let store = memory_store();
        assert!(store.fetch(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_writes_all_fields() {
        let store = memory_store();
        insert_question(&store, 1, Some("ng-if"), false);
        store
            .update(1, &update(true, vec!["https://cdn.test/a.png".to_string()]))
            .await
            .unwrap();

        let (statement, alternatives, images, active, note) = stored_row(&store, 1);
        assert_eq!(statement, "Texto limpo");
        assert!(alternatives.contains("\"letter\":\"C\""));
        assert_eq!(images.as_deref(), Some(r#"["https://cdn.test/a.png"]"#));
        assert!(active);
        assert_eq!(note.as_deref(), Some("High confidence in cleanup"));
    }

    #[tokio::test]
    async fn update_without_images_keeps_existing_list() {
        let store = memory_store();
        insert_question(&store, 1, Some("ng-if"), false);
        {
            let conn = store.lock().unwrap();
            conn.execute("UPDATE questions SET statement_images = '[\"old.png\"]' WHERE id = 1", [])
                .unwrap();
        }
        store.update(1, &update(false, vec![])).await.unwrap();
        let (_, _, images, active, _) = stored_row(&store, 1);
        assert_eq!(images.as_deref(), Some(r#"["old.png"]"#));
        assert!(!active);
    }

    #[tokio::test]
    async fn update_missing_record_is_not_found() {
        let store = memory_store();
        let err = store.update(9, &update(true, vec![])).await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
