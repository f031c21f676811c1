//! Durable store backed by a SQLite database file.
//!
//! Version uniqueness is a table constraint, scoped listings go through
//! per-workspace indexes, and every [`Store::transaction`] is one immediate SQL
//! transaction that commits only when the closure succeeds.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Params, Row, TransactionBehavior, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::store::{Records, Store, StoreError};
use crate::core::phase::RunPhase;
use crate::core::types::{
    Artifact, ArtifactId, EntityKind, Message, MessageId, NewArtifact, NewMessage, NewRun,
    NewWorkspace, Run, RunId, Workspace, WorkspaceId,
};
use crate::error::Error;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS workspaces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    owner_user_id TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
    skill_name TEXT NOT NULL,
    status TEXT NOT NULL,
    prompt TEXT NOT NULL,
    params_json TEXT NOT NULL,
    input_artifact_ids_json TEXT NOT NULL,
    output_artifact_ids_json TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
    path TEXT NOT NULL,
    type TEXT NOT NULL,
    version_group TEXT NOT NULL,
    version_number INTEGER NOT NULL,
    source_run_id INTEGER REFERENCES runs(id),
    published_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE (workspace_id, version_group, version_number)
);

CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workspace_id INTEGER NOT NULL REFERENCES workspaces(id),
    run_id INTEGER REFERENCES runs(id),
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workspaces_created ON workspaces(created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_artifacts_workspace ON artifacts(workspace_id, id);
CREATE INDEX IF NOT EXISTS idx_runs_workspace ON runs(workspace_id, created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_messages_workspace ON messages(workspace_id, id);
";

const WORKSPACE_COLUMNS: &str = "id, name, owner_user_id, status, created_at";
const ARTIFACT_COLUMNS: &str = "id, workspace_id, path, type, version_group, version_number, \
                                source_run_id, published_at, created_at";
const RUN_COLUMNS: &str = "id, workspace_id, skill_name, status, prompt, params_json, \
                           input_artifact_ids_json, output_artifact_ids_json, created_by, \
                           created_at, finished_at";
const MESSAGE_COLUMNS: &str = "id, workspace_id, run_id, role, content, created_at";

#[derive(Debug)]
pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let open_err = |source| StoreError::Open {
            path: path.clone(),
            source,
        };
        let conn = Connection::open(&path).map_err(open_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(open_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for SqliteStore {
    fn read<T>(&self, f: impl FnOnce(&dyn Records) -> Result<T, Error>) -> Result<T, Error> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&SqlRecords { conn: &conn })
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut dyn Records) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;
        let out = f(&mut SqlRecords { conn: &tx })?;
        tx.commit().map_err(db_err)?;
        Ok(out)
    }
}

/// Create an empty database unless one already exists (or `force` is set).
pub fn init_store_file(path: &Path, force: bool) -> Result<(), Error> {
    if force {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut target = path.as_os_str().to_owned();
            target.push(suffix);
            let target = PathBuf::from(target);
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Remove {
                        path: target,
                        source,
                    }
                    .into());
                }
            }
        }
    }
    SqliteStore::open(path).map(drop)
}

/// Record access over one connection or open transaction.
struct SqlRecords<'c> {
    conn: &'c Connection,
}

impl SqlRecords<'_> {
    fn query_one<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, Error> {
        self.conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.query_row(params, map).optional())
            .map_err(db_err)
    }

    fn query_all<T, P: Params>(
        &self,
        sql: &str,
        params: P,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, Error> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(db_err)?;
        let rows = stmt.query_map(params, map).map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn fetch<T>(
        &self,
        sql: &str,
        id: u64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
        kind: EntityKind,
    ) -> Result<T, Error> {
        self.query_one(sql, params![id], map)?
            .ok_or_else(|| Error::not_found(kind, id))
    }
}

impl Records for SqlRecords<'_> {
    fn workspace(&self, id: WorkspaceId) -> Result<Option<Workspace>, Error> {
        self.query_one(
            &format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?1"),
            params![id.0],
            workspace_row,
        )
    }

    fn artifact(&self, id: ArtifactId) -> Result<Option<Artifact>, Error> {
        self.query_one(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"),
            params![id.0],
            artifact_row,
        )
    }

    fn run(&self, id: RunId) -> Result<Option<Run>, Error> {
        self.query_one(
            &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
            params![id.0],
            run_row,
        )
    }

    fn workspaces(&self) -> Result<Vec<Workspace>, Error> {
        self.query_all(
            &format!(
                "SELECT {WORKSPACE_COLUMNS} FROM workspaces ORDER BY created_at DESC, id DESC"
            ),
            params![],
            workspace_row,
        )
    }

    fn artifacts_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Artifact>, Error> {
        self.query_all(
            &format!(
                "SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE workspace_id = ?1 ORDER BY id"
            ),
            params![workspace_id.0],
            artifact_row,
        )
    }

    fn version_group(
        &self,
        workspace_id: WorkspaceId,
        group: &str,
    ) -> Result<Vec<Artifact>, Error> {
        self.query_all(
            &format!(
                "SELECT {ARTIFACT_COLUMNS} FROM artifacts \
                 WHERE workspace_id = ?1 AND version_group = ?2 ORDER BY version_number"
            ),
            params![workspace_id.0, group],
            artifact_row,
        )
    }

    fn runs_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Run>, Error> {
        self.query_all(
            &format!(
                "SELECT {RUN_COLUMNS} FROM runs WHERE workspace_id = ?1 \
                 ORDER BY created_at DESC, id DESC"
            ),
            params![workspace_id.0],
            run_row,
        )
    }

    fn messages_in(&self, workspace_id: WorkspaceId) -> Result<Vec<Message>, Error> {
        self.query_all(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE workspace_id = ?1 ORDER BY id"
            ),
            params![workspace_id.0],
            message_row,
        )
    }

    fn insert_workspace(&mut self, new: NewWorkspace) -> Result<Workspace, Error> {
        self.conn
            .execute(
                "INSERT INTO workspaces (name, owner_user_id, status, created_at) \
                 VALUES (?1, ?2, 'active', ?3)",
                params![new.name, new.owner_user_id, encode_time(now())],
            )
            .map_err(db_err)?;
        let id = self.conn.last_insert_rowid().unsigned_abs();
        self.fetch(
            &format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?1"),
            id,
            workspace_row,
            EntityKind::Workspace,
        )
    }

    fn insert_artifact(&mut self, new: NewArtifact) -> Result<Artifact, Error> {
        self.conn
            .execute(
                "INSERT INTO artifacts (workspace_id, path, type, version_group, version_number, \
                 source_run_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    new.workspace_id.0,
                    new.path,
                    new.artifact_type,
                    new.version_group,
                    new.version_number,
                    new.source_run_id.map(|id| id.0),
                    encode_time(now()),
                ],
            )
            .map_err(|err| match db_err(err) {
                Error::DataIntegrity(detail) => Error::DataIntegrity(format!(
                    "version {} of '{}' in workspace {} was refused: {detail}",
                    new.version_number, new.version_group, new.workspace_id
                )),
                other => other,
            })?;
        let id = self.conn.last_insert_rowid().unsigned_abs();
        self.fetch(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"),
            id,
            artifact_row,
            EntityKind::Artifact,
        )
    }

    fn insert_run(&mut self, new: NewRun) -> Result<Run, Error> {
        let no_outputs: Vec<ArtifactId> = Vec::new();
        self.conn
            .execute(
                "INSERT INTO runs (workspace_id, skill_name, status, prompt, params_json, \
                 input_artifact_ids_json, output_artifact_ids_json, created_by, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.workspace_id.0,
                    new.skill_name,
                    new.phase.as_str(),
                    new.prompt,
                    encode_json("params", &new.params)?,
                    encode_json("input_artifact_ids", &new.input_artifact_ids)?,
                    encode_json("output_artifact_ids", &no_outputs)?,
                    new.created_by,
                    encode_time(now()),
                ],
            )
            .map_err(db_err)?;
        let id = self.conn.last_insert_rowid().unsigned_abs();
        self.fetch(
            &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
            id,
            run_row,
            EntityKind::Run,
        )
    }

    fn insert_message(&mut self, new: NewMessage) -> Result<Message, Error> {
        self.conn
            .execute(
                "INSERT INTO messages (workspace_id, run_id, role, content, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.workspace_id.0,
                    new.run_id.map(|id| id.0),
                    new.role,
                    new.content,
                    encode_time(now()),
                ],
            )
            .map_err(db_err)?;
        let id = self.conn.last_insert_rowid().unsigned_abs();
        self.fetch(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            id,
            message_row,
            EntityKind::Message,
        )
    }

    fn update_run(&mut self, run: &Run) -> Result<(), Error> {
        let changed = self
            .conn
            .execute(
                "UPDATE runs SET skill_name = ?2, status = ?3, prompt = ?4, params_json = ?5, \
                 input_artifact_ids_json = ?6, output_artifact_ids_json = ?7, created_by = ?8, \
                 finished_at = ?9 WHERE id = ?1",
                params![
                    run.id.0,
                    run.skill_name,
                    run.phase.as_str(),
                    run.prompt,
                    encode_json("params", &run.params)?,
                    encode_json("input_artifact_ids", &run.input_artifact_ids)?,
                    encode_json("output_artifact_ids", &run.output_artifact_ids)?,
                    run.created_by,
                    run.finished_at.map(encode_time),
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(Error::not_found(EntityKind::Run, run.id));
        }
        Ok(())
    }

    fn set_published_at(&mut self, id: ArtifactId, at: DateTime<Utc>) -> Result<Artifact, Error> {
        let changed = self
            .conn
            .execute(
                "UPDATE artifacts SET published_at = ?2 WHERE id = ?1",
                params![id.0, encode_time(at.trunc_subsecs(6))],
            )
            .map_err(db_err)?;
        if changed == 0 {
            return Err(Error::not_found(EntityKind::Artifact, id));
        }
        self.fetch(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE id = ?1"),
            id.0,
            artifact_row,
            EntityKind::Artifact,
        )
    }
}

/// Constraint violations surface as integrity errors; everything else is a store failure.
fn db_err(err: rusqlite::Error) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(failure, detail)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::DataIntegrity(detail.clone().unwrap_or_else(|| failure.to_string()))
        }
        _ => Error::Store(StoreError::Database(err)),
    }
}

/// Stored timestamps keep microsecond precision so they survive a round trip unchanged.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn encode_json<T: Serialize>(field: &'static str, value: &T) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { field, source }.into())
}

fn conversion_err(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| conversion_err(idx, err))
}

fn optional_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => time_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|err| conversion_err(idx, err))
}

fn workspace_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: WorkspaceId(row.get(0)?),
        name: row.get(1)?,
        owner_user_id: row.get(2)?,
        status: row.get(3)?,
        created_at: time_at(row, 4)?,
    })
}

fn artifact_row(row: &Row<'_>) -> rusqlite::Result<Artifact> {
    Ok(Artifact {
        id: ArtifactId(row.get(0)?),
        workspace_id: WorkspaceId(row.get(1)?),
        path: row.get(2)?,
        artifact_type: row.get(3)?,
        version_group: row.get(4)?,
        version_number: row.get(5)?,
        source_run_id: row.get::<_, Option<u64>>(6)?.map(RunId),
        published_at: optional_time_at(row, 7)?,
        created_at: time_at(row, 8)?,
    })
}

fn run_row(row: &Row<'_>) -> rusqlite::Result<Run> {
    let status: String = row.get(3)?;
    let phase = RunPhase::parse(&status)
        .ok_or_else(|| conversion_err(3, format!("unknown run status '{status}'")))?;
    Ok(Run {
        id: RunId(row.get(0)?),
        workspace_id: WorkspaceId(row.get(1)?),
        skill_name: row.get(2)?,
        phase,
        prompt: row.get(4)?,
        params: json_at(row, 5)?,
        input_artifact_ids: json_at(row, 6)?,
        output_artifact_ids: json_at(row, 7)?,
        created_by: row.get(8)?,
        created_at: time_at(row, 9)?,
        finished_at: optional_time_at(row, 10)?,
    })
}

fn message_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        workspace_id: WorkspaceId(row.get(1)?),
        run_id: row.get::<_, Option<u64>>(2)?.map(RunId),
        role: row.get(3)?,
        content: row.get(4)?,
        created_at: time_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_artifact, new_run};

    fn demo(name: &str) -> NewWorkspace {
        NewWorkspace {
            name: name.to_string(),
            owner_user_id: "demo".to_string(),
        }
    }

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(temp.path().join("state").join("atelier.db")).expect("open");
        (temp, store)
    }

    /// Committed records, including run JSON columns and timestamps, survive reopening.
    #[test]
    fn commits_are_durable() {
        let (_temp, store) = temp_store();
        let (ws, run, artifact) = store
            .transaction(|records| {
                let ws = records.insert_workspace(demo("demo"))?;
                let mut run =
                    records.insert_run(new_run(ws.id, "ppt_revise", RunPhase::Running))?;
                let artifact = records
                    .insert_artifact(new_artifact(ws.id, "out/deck.pptx", "deck.pptx", 1))?;
                run.phase = RunPhase::Success;
                run.output_artifact_ids.push(artifact.id);
                run.params.insert("tone".to_string(), "formal".into());
                run.finished_at = Some(now());
                records.update_run(&run)?;
                Ok((ws, run, artifact))
            })
            .expect("commit");

        let reopened = SqliteStore::open(store.path()).expect("reopen");
        reopened
            .read(|records| {
                assert_eq!(records.workspace(ws.id)?, Some(ws.clone()));
                assert_eq!(records.run(run.id)?, Some(run.clone()));
                assert_eq!(records.artifacts_in(ws.id)?, vec![artifact.clone()]);
                Ok(())
            })
            .expect("read");
    }

    /// A failing closure rolls the SQL transaction back, ids included.
    #[test]
    fn failed_transaction_rolls_back() {
        let (_temp, store) = temp_store();
        let result: Result<(), Error> = store.transaction(|records| {
            let ws = records.insert_workspace(demo("doomed"))?;
            records.insert_artifact(new_artifact(ws.id, "raw/a.pdf", "a.pdf", 1))?;
            Err(Error::InvalidInput("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.read(|records| records.workspaces()).expect("read").is_empty());

        let ws = store
            .transaction(|records| records.insert_workspace(demo("next")))
            .expect("commit");
        assert_eq!(ws.id, WorkspaceId(1));
    }

    /// The unique (workspace, group, version) constraint refuses a second copy.
    #[test]
    fn duplicate_version_is_a_data_integrity_error() {
        let (_temp, store) = temp_store();
        let ws = store
            .transaction(|records| {
                let ws = records.insert_workspace(demo("demo"))?;
                records.insert_artifact(new_artifact(ws.id, "raw/a.pdf", "a.pdf", 1))?;
                Ok(ws.id)
            })
            .expect("seed");

        let err = store
            .transaction(|records| {
                records.insert_artifact(new_artifact(ws, "out/a.pdf", "a.pdf", 1))
            })
            .expect_err("duplicate");
        assert!(matches!(err, Error::DataIntegrity(_)), "{err:?}");
        let group = store
            .read(|records| records.version_group(ws, "a.pdf"))
            .expect("read");
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn listings_follow_their_orderings() {
        let (_temp, store) = temp_store();
        let (ws, other) = store
            .transaction(|records| {
                let ws = records.insert_workspace(demo("demo"))?.id;
                let other = records.insert_workspace(demo("other"))?.id;
                for version in [2, 1, 3] {
                    records.insert_artifact(new_artifact(ws, "out/p.pptx", "p.pptx", version))?;
                }
                records.insert_artifact(new_artifact(other, "out/p.pptx", "p.pptx", 1))?;
                records.insert_run(new_run(ws, "ppt_revise", RunPhase::Queued))?;
                records.insert_run(new_run(ws, "doc_analyze", RunPhase::Queued))?;
                Ok((ws, other))
            })
            .expect("seed");

        store
            .read(|records| {
                let names: Vec<_> = records.workspaces()?.into_iter().map(|w| w.name).collect();
                assert_eq!(names, vec!["other", "demo"]);

                let versions: Vec<_> = records
                    .version_group(ws, "p.pptx")?
                    .into_iter()
                    .map(|a| a.version_number)
                    .collect();
                assert_eq!(versions, vec![1, 2, 3]);
                assert_eq!(records.version_group(other, "p.pptx")?.len(), 1);

                let skills: Vec<_> = records
                    .runs_in(ws)?
                    .into_iter()
                    .map(|r| r.skill_name)
                    .collect();
                assert_eq!(skills, vec!["doc_analyze", "ppt_revise"]);
                assert!(records.runs_in(other)?.is_empty());
                Ok(())
            })
            .expect("read");
    }

    #[test]
    fn update_of_missing_run_is_not_found() {
        let (_temp, store) = temp_store();
        let run = store
            .transaction(|records| {
                let ws = records.insert_workspace(demo("demo"))?;
                records.insert_run(new_run(ws.id, "ppt_revise", RunPhase::Running))
            })
            .expect("seed");
        let mut missing = run;
        missing.id = RunId(99);
        let err = store
            .transaction(|records| records.update_run(&missing))
            .expect_err("missing");
        assert!(matches!(err, Error::NotFound { kind: EntityKind::Run, id: 99 }));
    }

    #[test]
    fn init_does_not_clobber_without_force() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("atelier.db");
        init_store_file(&path, false).expect("init");
        SqliteStore::open(&path)
            .expect("open")
            .transaction(|records| records.insert_workspace(demo("demo")))
            .expect("commit");

        init_store_file(&path, false).expect("init again");
        let kept = SqliteStore::open(&path).expect("reopen");
        assert_eq!(kept.read(|records| records.workspaces()).expect("read").len(), 1);
        drop(kept);

        init_store_file(&path, true).expect("force");
        let reset = SqliteStore::open(&path).expect("reopen");
        assert!(reset.read(|records| records.workspaces()).expect("read").is_empty());
    }
}
