//! [`SqliteStore`], the SQLite implementation of [`CatalogStore`].

use std::{collections::HashSet, path::Path};

use acs_core::{
  store::{CatalogStats, CatalogStore, SearchHit, SearchQuery, VariableSummary},
  variable::{VariableCatalog, VariableDefinition},
};
use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};

use crate::{
  Error, Result,
  encode::{
    HIT_COLUMNS, RawHit, RawRefresh, RawVariable, VARIABLE_COLUMNS, decode_count,
    encode_dt, like_pattern,
  },
  schema::SCHEMA,
};

/// Fields every search term is matched against.
const SEARCH_FIELDS: [&str; 4] = ["label", "concept", "id", "group_id"];

const TOP_GROUPS: i64 = 10;

/// `(f1 LIKE ?n ESCAPE '\' OR f2 LIKE ?n ESCAPE '\' ...)`
fn any_field_like(param: usize) -> String {
  let parts: Vec<String> = SEARCH_FIELDS
    .iter()
    .map(|f| format!("{f} LIKE ?{param} ESCAPE '\\'"))
    .collect();
  format!("({})", parts.join(" OR "))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A variable catalog backed by a single SQLite file.
///
/// Clones share one reference-counted connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Years with at least one stored variable, ascending.
  pub async fn years(&self) -> Result<Vec<u16>> {
    let years = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT DISTINCT year FROM variables ORDER BY year")?;
        let years = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<u16>>>()?;
        Ok(years)
      })
      .await?;
    Ok(years)
  }
}

impl CatalogStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_year(&self, catalog: VariableCatalog) -> Result<usize> {
    let year = catalog.year();
    let raws = catalog
      .into_definitions()
      .map(RawVariable::encode)
      .collect::<Result<Vec<_>>>()?;
    let at_str = encode_dt(Utc::now());

    let written = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT OR REPLACE INTO variables ({VARIABLE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
          ))?;
          for r in &raws {
            stmt.execute(rusqlite::params![
              r.year,
              r.id,
              r.label,
              r.concept,
              r.group,
              r.predicate_type,
              r.limit,
              r.attributes_json,
              r.values_json,
            ])?;
          }
        }
        let written = raws.len() as i64;
        tx.execute(
          "INSERT INTO refreshes (year, refreshed_at, variable_count) VALUES (?1, ?2, ?3)",
          rusqlite::params![year, at_str, written],
        )?;
        tx.commit()?;
        Ok(written)
      })
      .await?;

    decode_count(written)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn load_catalog(&self, year: u16) -> Result<Option<VariableCatalog>> {
    let raws: Vec<RawVariable> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {VARIABLE_COLUMNS} FROM variables WHERE year = ?1"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![year], RawVariable::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    if raws.is_empty() {
      return Ok(None);
    }
    let defs = raws
      .into_iter()
      .map(RawVariable::into_definition)
      .collect::<Result<Vec<_>>>()?;
    Ok(Some(VariableCatalog::from_definitions(year, defs)))
  }

  /// Two passes. The whole query as a phrase first, ranked by where it
  /// matched (label, then id, then concept, then group). If that leaves room
  /// under the limit, a second pass requires every word to match somewhere
  /// and fills the remainder, ordered by label, without repeating a hit.
  async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
    let text = query.text.trim().to_owned();
    let limit = query.effective_limit();
    if text.is_empty() || limit == 0 {
      return Ok(Vec::new());
    }
    let words: Vec<String> = text.split_whitespace().map(like_pattern).collect();
    let phrase = like_pattern(&text);
    let year = query.year;

    let raws: Vec<RawHit> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {HIT_COLUMNS} FROM variables
           WHERE {matches} AND (?2 IS NULL OR year = ?2)
           ORDER BY CASE
               WHEN label   LIKE ?1 ESCAPE '\\' THEN 1
               WHEN id      LIKE ?1 ESCAPE '\\' THEN 2
               WHEN concept LIKE ?1 ESCAPE '\\' THEN 3
               ELSE 4
             END, label, year DESC, id
           LIMIT ?3",
          matches = any_field_like(1),
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut hits = stmt
          .query_map(
            rusqlite::params![phrase, year, limit as i64],
            RawHit::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        if hits.len() >= limit {
          return Ok(hits);
        }

        // ?1 year, ?2 limit, ?3.. one pattern per word.
        let conds: Vec<String> = (0..words.len()).map(|i| any_field_like(i + 3)).collect();
        let sql = format!(
          "SELECT {HIT_COLUMNS} FROM variables
           WHERE {} AND (?1 IS NULL OR year = ?1)
           ORDER BY label, year DESC, id
           LIMIT ?2",
          conds.join(" AND "),
        );
        // Over-fetch by the number already returned, then drop repeats.
        let mut params: Vec<Value> = vec![
          year.map_or(Value::Null, |y| Value::Integer(y.into())),
          Value::Integer((limit + hits.len()) as i64),
        ];
        params.extend(words.into_iter().map(Value::Text));

        let seen: HashSet<(String, u16)> =
          hits.iter().map(|h| (h.id.clone(), h.year)).collect();
        let mut stmt = conn.prepare(&sql)?;
        let extra = stmt
          .query_map(rusqlite::params_from_iter(params), RawHit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        let room = limit - hits.len();
        hits.extend(
          extra
            .into_iter()
            .filter(|h| !seen.contains(&(h.id.clone(), h.year)))
            .take(room),
        );
        Ok(hits)
      })
      .await?;

    Ok(raws.into_iter().map(RawHit::into_hit).collect())
  }

  async fn get_variable(
    &self,
    id: &str,
    year: Option<u16>,
  ) -> Result<Option<VariableDefinition>> {
    let id = id.trim().to_owned();

    let raw: Option<RawVariable> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {VARIABLE_COLUMNS} FROM variables
                 WHERE id = ?1 COLLATE NOCASE AND (?2 IS NULL OR year = ?2)
                 ORDER BY year DESC
                 LIMIT 1"
              ),
              rusqlite::params![id, year],
              RawVariable::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawVariable::into_definition).transpose()
  }

  async fn variables_by_group(
    &self,
    group: &str,
    year: u16,
  ) -> Result<Vec<VariableSummary>> {
    let group = group.trim().to_uppercase();

    let raws: Vec<RawHit> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HIT_COLUMNS} FROM variables
           WHERE group_id = ?1 AND year = ?2
           ORDER BY id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![group, year], RawHit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawHit::into_summary).collect())
  }

  async fn stats(&self) -> Result<CatalogStats> {
    let (total, by_year, top_groups, refreshes) = self
      .conn
      .call(|conn| {
        let total: i64 =
          conn.query_row("SELECT COUNT(*) FROM variables", [], |row| row.get(0))?;

        let mut stmt =
          conn.prepare("SELECT year, COUNT(*) FROM variables GROUP BY year ORDER BY year")?;
        let by_year = stmt
          .query_map([], |row| Ok((row.get::<_, u16>(0)?, row.get::<_, i64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT group_id, COUNT(*) AS n FROM variables
           WHERE group_id != ''
           GROUP BY group_id
           ORDER BY n DESC, group_id
           LIMIT ?1",
        )?;
        let top_groups = stmt
          .query_map([TOP_GROUPS], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT year, refreshed_at, variable_count FROM refreshes
           ORDER BY refreshed_at DESC, refresh_id DESC",
        )?;
        let refreshes = stmt
          .query_map([], |row| {
            Ok(RawRefresh {
              year:           row.get(0)?,
              refreshed_at:   row.get(1)?,
              variable_count: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((total, by_year, top_groups, refreshes))
      })
      .await?;

    Ok(CatalogStats {
      total:      decode_count(total)?,
      by_year:    by_year
        .into_iter()
        .map(|(y, n)| decode_count(n).map(|n| (y, n)))
        .collect::<Result<_>>()?,
      top_groups: top_groups
        .into_iter()
        .map(|(g, n)| decode_count(n).map(|n| (g, n)))
        .collect::<Result<_>>()?,
      refreshes:  refreshes
        .into_iter()
        .map(RawRefresh::into_record)
        .collect::<Result<_>>()?,
    })
  }
}
