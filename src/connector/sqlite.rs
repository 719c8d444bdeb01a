//! `SQLite` graph connector.
//!
//! Stores the property graph as two tables (`nodes`, `edges` — `edges`
//! carries `tags` as a JSON column rather than a separate join table) and
//! computes the propagation rule and tag similarity in-query via custom
//! scalar functions, so neighborhoods never have to be shipped over the
//! wire for scoring (spec §6). Mirrors `SqliteGraphBackend`'s
//! `Mutex<Connection>` + `acquire_lock` concurrency story
//! (`src/storage/graph/sqlite.rs`) and its `#[instrument]`/`metrics`
//! instrumentation.

// SQLite returns i64/f64; node/edge counts and offsets are inherently
// non-negative and small, matching the teacher's own allowances for this
// module.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};
use tracing::instrument;

use super::{FrontierInput, GraphConnector};
use crate::model::{ExpansionCandidate, GraphEdge, GraphNode, PropertyMap, SeedFetchResult};
use crate::tag_sim::tag_sim;
use crate::{Error, Result};

/// Helper to acquire mutex lock with poison recovery, matching the
/// teacher's `acquire_lock` idiom.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("graph sqlite mutex was poisoned, recovering");
            metrics::counter!("hippocampus_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Whether a `rusqlite` error is a connection/timeout-class failure safe
/// to retry (spec §7 point 2) rather than a fatal one (malformed SQL, a
/// constraint violation, a type conversion failure) that must propagate
/// on its first occurrence.
fn is_transient_rusqlite_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(sqlite_err, _) => matches!(
            sqlite_err.code,
            rusqlite::ErrorCode::DatabaseBusy
                | rusqlite::ErrorCode::DatabaseLocked
                | rusqlite::ErrorCode::OperationInterrupted
        ),
        _ => false,
    }
}

/// Builds an `Error::OperationFailed` from a `rusqlite::Error`, classifying
/// it transient or fatal via [`is_transient_rusqlite_error`].
fn operation_failed(operation: &str, err: rusqlite::Error) -> Error {
    let transient = is_transient_rusqlite_error(&err);
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: err.to_string(),
        transient,
    }
}

/// A labeled property graph backed by `SQLite`.
///
/// # Schema
///
/// - `nodes(id TEXT PRIMARY KEY, labels TEXT, properties TEXT)` — `labels`
///   and `properties` are JSON-encoded.
/// - `edges(rowid, node_a TEXT, node_b TEXT, weight REAL, tags TEXT,
///   properties TEXT)` — `RELATES` is modeled as a single undirected row
///   per pair; `tags` and `properties` are JSON-encoded.
///
/// # Concurrency
///
/// Uses a `Mutex<Connection>` for thread-safe access, same as the teacher.
/// `rusqlite` has no async story of its own, so each call briefly blocks
/// its worker thread for the duration of one query; callers running this
/// connector under a multi-threaded `tokio` runtime (as
/// `#[tokio::main(flavor = "multi_thread")]` or the default runtime
/// feature this crate depends on provides) are unaffected beyond that one
/// worker thread.
pub struct SqliteGraphConnector {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    tag_sim_floor: f64,
    min_activation: f64,
}

impl SqliteGraphConnector {
    /// Opens (creating if necessary) a `SQLite`-backed graph at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(
        db_path: impl Into<PathBuf>,
        tag_sim_floor: f64,
        min_activation: f64,
    ) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| operation_failed("open_graph_sqlite", e))?;

        let connector = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            tag_sim_floor,
            min_activation,
        };
        connector.initialize()?;
        Ok(connector)
    }

    /// Opens an in-memory `SQLite`-backed graph (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(tag_sim_floor: f64, min_activation: f64) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| operation_failed("open_graph_sqlite_memory", e))?;

        let connector = Self {
            conn: Mutex::new(conn),
            db_path: None,
            tag_sim_floor,
            min_activation,
        };
        connector.initialize()?;
        Ok(connector)
    }

    /// Returns the database path, if backed by a file.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Initializes schema, indexes, and the `tag_sim`/`sqrt` scalar functions.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);

        let _ = conn.pragma_update(None, "journal_mode", "WAL");
        let _ = conn.pragma_update(None, "synchronous", "NORMAL");
        let _ = conn.pragma_update(None, "busy_timeout", "5000");
        let _ = conn.pragma_update(None, "foreign_keys", "ON");

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                labels TEXT NOT NULL,
                properties TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| operation_failed("create_nodes_table", e))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                node_a TEXT NOT NULL,
                node_b TEXT NOT NULL,
                weight REAL,
                tags TEXT NOT NULL DEFAULT '[]',
                properties TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY (node_a) REFERENCES nodes(id) ON DELETE CASCADE,
                FOREIGN KEY (node_b) REFERENCES nodes(id) ON DELETE CASCADE
            )",
            [],
        )
        .map_err(|e| operation_failed("create_edges_table", e))?;

        Self::create_indexes(&conn);
        self.register_functions(&conn)?;

        Ok(())
    }

    /// Creates indexes recommended by spec §6 (one per id lookup path).
    fn create_indexes(conn: &Connection) {
        let _ = conn.execute("CREATE INDEX IF NOT EXISTS idx_nodes_id ON nodes(id)", []);
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_node_a ON edges(node_a)",
            [],
        );
        let _ = conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_node_b ON edges(node_b)",
            [],
        );
    }

    /// Registers the `tag_sim(tags_json, query_tags_json)` and
    /// `sqrt(x)` scalar functions used by `expand_frontier`'s query, so
    /// the propagation rule and the Jaccard formula are computed inside
    /// the store rather than shipped neighborhoods over the wire.
    fn register_functions(&self, conn: &Connection) -> Result<()> {
        let floor = self.tag_sim_floor;
        conn.create_scalar_function(
            "hippo_tag_sim",
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            move |ctx| {
                let edge_tags_json: String = ctx.get(0)?;
                let query_tags_json: String = ctx.get(1)?;
                let edge_tags: Vec<String> =
                    serde_json::from_str(&edge_tags_json).unwrap_or_default();
                let query_tags: Vec<String> =
                    serde_json::from_str(&query_tags_json).unwrap_or_default();
                Ok(tag_sim(&edge_tags, &query_tags, floor))
            },
        )
        .map_err(|e| operation_failed("register_tag_sim_function", e))?;

        conn.create_scalar_function(
            "hippo_sqrt",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let value: f64 = ctx.get(0)?;
                Ok(value.sqrt())
            },
        )
        .map_err(|e| operation_failed("register_sqrt_function", e))?;

        Ok(())
    }

    /// Inserts or replaces a node. Test/ingestion helper — the core has no
    /// write path of its own (spec §1 non-goal), but connector tests need
    /// a way to seed data.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn upsert_node(&self, node: &GraphNode) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let labels_json = serde_json::to_string(&node.labels).unwrap_or_else(|_| "[]".to_string());
        let properties_json =
            serde_json::to_string(&node.properties).unwrap_or_else(|_| "{}".to_string());
        conn.execute(
            "INSERT INTO nodes (id, labels, properties) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET labels = excluded.labels, properties = excluded.properties",
            rusqlite::params![node.id, labels_json, properties_json],
        )
        .map_err(|e| operation_failed("upsert_node", e))?;
        Ok(())
    }

    /// Inserts an undirected `RELATES` edge. Test/ingestion helper.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_edge(
        &self,
        node_a: &str,
        node_b: &str,
        weight: Option<f64>,
        tags: &[String],
        properties: &PropertyMap,
    ) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        let tags_json = serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string());
        let properties_json = serde_json::to_string(properties).unwrap_or_else(|_| "{}".to_string());
        conn.execute(
            "INSERT INTO edges (node_a, node_b, weight, tags, properties) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![node_a, node_b, weight, tags_json, properties_json],
        )
        .map_err(|e| operation_failed("insert_edge", e))?;
        Ok(())
    }

    fn parse_node_row(row: &Row<'_>) -> rusqlite::Result<GraphNode> {
        let id: String = row.get("id")?;
        let labels_json: String = row.get("labels")?;
        let properties_json: String = row.get("properties")?;
        let labels: Vec<String> = serde_json::from_str(&labels_json).unwrap_or_default();
        let properties: PropertyMap = serde_json::from_str(&properties_json).unwrap_or_default();
        Ok(GraphNode {
            id,
            labels,
            properties,
        })
    }

    fn fetch_seed_blocking(conn: &Connection, node_id: &str) -> Result<SeedFetchResult> {
        let mut stmt = conn
            .prepare("SELECT id, labels, properties FROM nodes WHERE id = ?1")
            .map_err(|e| operation_failed("fetch_seed_prepare", e))?;

        let node = stmt
            .query_row(rusqlite::params![node_id], Self::parse_node_row)
            .optional()
            .map_err(|e| operation_failed("fetch_seed", e))?;

        Ok(match node {
            Some(node) => SeedFetchResult {
                labels: node.labels.clone(),
                node: Some(node),
                found: true,
            },
            None => SeedFetchResult::not_found(),
        })
    }

    /// Expands a single frontier parent. Called once per entry; the
    /// batching contract of spec §4.2 is satisfied at the connector-call
    /// level (one `expand_frontier` call handles the whole frontier),
    /// even though each parent's neighbors are fetched with their own
    /// statement execution to keep the generated SQL simple and auditable.
    fn expand_one_parent(
        conn: &Connection,
        parent_id: &str,
        activation: f64,
        visited_ids: &HashSet<String>,
        query_tags_json: &str,
        min_activation: f64,
    ) -> Result<Vec<ExpansionCandidate>> {
        let degree: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM edges WHERE node_a = ?1 OR node_b = ?1",
                rusqlite::params![parent_id],
                |row| row.get(0),
            )
            .map_err(|e| operation_failed("expand_frontier_degree", e))?;

        if degree == 0 {
            return Ok(Vec::new());
        }

        let visited: Vec<&str> = visited_ids.iter().map(String::as_str).collect();
        let exclusion_placeholders: Vec<String> =
            (0..visited.len()).map(|i| format!("?{}", i + 5)).collect();
        let exclusion_clause = if exclusion_placeholders.is_empty() {
            String::new()
        } else {
            format!("AND n.id NOT IN ({})", exclusion_placeholders.join(", "))
        };

        let sql = format!(
            "SELECT
                 n.id AS neighbor_id, n.labels AS neighbor_labels, n.properties AS neighbor_properties,
                 e.weight AS weight, e.tags AS tags, e.properties AS edge_properties,
                 (?1 * COALESCE(e.weight, 0.01) / hippo_sqrt(?2)) AS base_energy,
                 hippo_tag_sim(e.tags, ?3) AS sim
             FROM edges e
             JOIN nodes n ON n.id = CASE WHEN e.node_a = ?4 THEN e.node_b ELSE e.node_a END
             WHERE (e.node_a = ?4 OR e.node_b = ?4)
                 {exclusion_clause}
             ORDER BY base_energy * sim DESC"
        );

        let mut stmt = conn.prepare(&sql).map_err(|e| operation_failed("expand_frontier_prepare", e))?;

        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(activation),
            Box::new(degree as f64),
            Box::new(query_tags_json.to_string()),
            Box::new(parent_id.to_string()),
        ];
        for id in &visited {
            bound.push(Box::new((*id).to_string()));
        }
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(AsRef::as_ref).collect();

        let rows = stmt
            .query_map(params_from_iter(param_refs), |row| {
                let neighbor_id: String = row.get("neighbor_id")?;
                let neighbor_labels: String = row.get("neighbor_labels")?;
                let neighbor_properties: String = row.get("neighbor_properties")?;
                let weight: Option<f64> = row.get("weight")?;
                let tags_json: String = row.get("tags")?;
                let edge_properties_json: String = row.get("edge_properties")?;
                let base_energy: f64 = row.get("base_energy")?;
                let sim: f64 = row.get("sim")?;
                Ok((
                    neighbor_id,
                    neighbor_labels,
                    neighbor_properties,
                    weight,
                    tags_json,
                    edge_properties_json,
                    base_energy * sim,
                ))
            })
            .map_err(|e| operation_failed("expand_frontier", e))?;

        let mut candidates = Vec::new();
        for row in rows {
            let (neighbor_id, labels_json, properties_json, weight, tags_json, edge_props_json, transfer_energy) =
                row.map_err(|e| operation_failed("expand_frontier_row", e))?;

            if transfer_energy <= min_activation {
                continue;
            }

            let labels: Vec<String> = serde_json::from_str(&labels_json).unwrap_or_default();
            let properties: PropertyMap = serde_json::from_str(&properties_json).unwrap_or_default();
            let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
            let edge_properties: PropertyMap =
                serde_json::from_str(&edge_props_json).unwrap_or_default();

            candidates.push(ExpansionCandidate {
                parent_id: parent_id.to_string(),
                neighbor_node: GraphNode {
                    id: neighbor_id.clone(),
                    labels,
                    properties,
                },
                edge: GraphEdge {
                    source_id: parent_id.to_string(),
                    target_id: neighbor_id,
                    edge_type: "RELATES".to_string(),
                    properties: edge_properties,
                    weight,
                    tags,
                },
                transfer_energy,
            });
        }

        Ok(candidates)
    }
}

impl GraphConnector for SqliteGraphConnector {
    #[instrument(skip(self))]
    async fn fetch_seed(&self, node_id: &str) -> Result<SeedFetchResult> {
        metrics::counter!("hippocampus_connector_fetch_seed_total").increment(1);
        let start = std::time::Instant::now();
        let conn = acquire_lock(&self.conn);
        let result = Self::fetch_seed_blocking(&conn, node_id);
        metrics::histogram!("hippocampus_connector_fetch_seed_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        result
    }

    #[instrument(skip(self, frontier, visited_ids, query_tags))]
    async fn expand_frontier(
        &self,
        frontier: &[FrontierInput],
        visited_ids: &HashSet<String>,
        query_tags: &[String],
    ) -> Result<Vec<ExpansionCandidate>> {
        metrics::counter!("hippocampus_connector_expand_frontier_total").increment(1);
        let start = std::time::Instant::now();
        let conn = acquire_lock(&self.conn);
        let query_tags_json = serde_json::to_string(query_tags).unwrap_or_else(|_| "[]".to_string());

        let mut out = Vec::new();
        for (parent_id, activation) in frontier {
            let mut candidates = Self::expand_one_parent(
                &conn,
                parent_id,
                *activation,
                visited_ids,
                &query_tags_json,
                self.min_activation,
            )?;
            out.append(&mut candidates);
        }

        metrics::histogram!("hippocampus_connector_expand_frontier_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        Ok(out)
    }
}
