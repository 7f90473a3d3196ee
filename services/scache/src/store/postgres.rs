//! Postgres-backed strategy store and topology.

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use monstra_model::{Expression, Node, Strategy, Tag};
use sqlx::{postgres::PgPool, postgres::PgRow, types::Json, Row};

use super::{StoreError, StraStore, Topology};

const STRA_COLUMNS: &str = r#"
    id, name, category, nid, excl_nid, alert_dur, recovery_dur, priority,
    callback, exprs, tags, creator, created, last_updator, last_updated
"#;

struct StraRow(Strategy);

impl<'r> sqlx::FromRow<'r, PgRow> for StraRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let created: DateTime<Utc> = row.try_get("created")?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated")?;
        let exprs: Json<Vec<Expression>> = row.try_get("exprs")?;
        let tags: Json<Vec<Tag>> = row.try_get("tags")?;

        let mut stra = Strategy::new(
            row.try_get("id")?,
            row.try_get("nid")?,
            row.try_get("category")?,
        );
        stra.name = row.try_get("name")?;
        stra.excl_nid = row.try_get("excl_nid")?;
        stra.alert_dur = row.try_get("alert_dur")?;
        stra.recovery_dur = row.try_get("recovery_dur")?;
        stra.priority = row.try_get("priority")?;
        stra.callback = row.try_get("callback")?;
        stra.exprs = exprs.0;
        stra.tags = tags.0;
        stra.creator = row.try_get("creator")?;
        stra.created = created.with_timezone(&Local).fixed_offset();
        stra.last_updator = row.try_get("last_updator")?;
        stra.last_updated = last_updated.with_timezone(&Local).fixed_offset();

        Ok(Self(stra))
    }
}

struct NodeRow(Node);

impl<'r> sqlx::FromRow<'r, PgRow> for NodeRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self(Node {
            id: row.try_get("id")?,
            pid: row.try_get("pid")?,
            ident: row.try_get("ident")?,
            name: row.try_get("name")?,
            path: row.try_get("path")?,
            leaf: row.try_get("leaf")?,
        }))
    }
}

/// Strategy store and topology over the `stra`, `node` and
/// `node_endpoint` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn require_node(&self, nid: i64) -> Result<Node, StoreError> {
        self.get_node(nid)
            .await?
            .ok_or(StoreError::NodeNotFound(nid))
    }

    async fn descendants(
        &self,
        nid: i64,
        excl: &[i64],
        leaf_only: bool,
    ) -> Result<Vec<i64>, StoreError> {
        let root = self.require_node(nid).await?;

        if leaf_only && root.leaf {
            return Ok(if excl.contains(&root.id) {
                Vec::new()
            } else {
                vec![root.id]
            });
        }

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT c.id
            FROM node c
            WHERE starts_with(c.path, $1 || '.')
              AND ($3 = FALSE OR c.leaf)
              AND NOT EXISTS (
                  SELECT 1 FROM node x
                  WHERE x.id = ANY($2)
                    AND (c.id = x.id OR starts_with(c.path, x.path || '.'))
              )
            ORDER BY c.id
            "#,
        )
        .bind(&root.path)
        .bind(excl)
        .bind(leaf_only)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(ids)
    }

    async fn list_stras(&self, effective_only: bool) -> Result<Vec<Strategy>, StoreError> {
        let sql = format!(
            "SELECT {STRA_COLUMNS} FROM stra WHERE ($1 = FALSE OR enabled) ORDER BY id"
        );

        let rows = sqlx::query_as::<_, StraRow>(&sql)
            .bind(effective_only)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Query)?;

        Ok(rows.into_iter().map(|StraRow(s)| s).collect())
    }
}

#[async_trait]
impl StraStore for PgStore {
    async fn list_effective(&self) -> Result<Vec<Strategy>, StoreError> {
        self.list_stras(true).await
    }

    async fn list_all(&self) -> Result<Vec<Strategy>, StoreError> {
        self.list_stras(false).await
    }

    async fn delete_stra(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM stra WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }

    async fn get_node(&self, id: i64) -> Result<Option<Node>, StoreError> {
        let row = sqlx::query_as::<_, NodeRow>(
            "SELECT id, pid, ident, name, path, leaf FROM node WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::Query)?;

        Ok(row.map(|NodeRow(n)| n))
    }
}

#[async_trait]
impl Topology for PgStore {
    async fn related_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.descendants(nid, excl, false).await
    }

    async fn leaf_ids(&self, nid: i64, excl: &[i64]) -> Result<Vec<i64>, StoreError> {
        self.descendants(nid, excl, true).await
    }

    async fn hosts_under(&self, leaf_id: i64) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar(
            "SELECT endpoint FROM node_endpoint WHERE node_id = $1 ORDER BY endpoint",
        )
        .bind(leaf_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Query)
    }
}
