use super::ReorderStore;
use crate::{
    capping::{CapBound, CapModel},
    error::{PipelineError, PipelineResult},
    features::Feature,
    scoring::{TargetingEntry, TargetingList},
};
use rusqlite::params;

impl ReorderStore {
    // ── Capping bounds ─────────────────────────────────────────

    pub fn save_capping_bounds(&self, run_id: &str, caps: &CapModel) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO capping_bound (run_id, feature, q1, q3, upper_bound)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(run_id, feature) DO UPDATE SET
                    q1 = excluded.q1, q3 = excluded.q3, upper_bound = excluded.upper_bound",
            )?;
            for b in &caps.bounds {
                stmt.execute(params![run_id, b.feature.name(), b.q1, b.q3, b.upper_bound])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Frozen bounds for a previous run, so a later scoring pass can reuse them.
    pub fn capping_bounds(&self, run_id: &str) -> PipelineResult<Vec<CapBound>> {
        let mut stmt = self.conn.prepare(
            "SELECT feature, q1, q3, upper_bound FROM capping_bound
             WHERE run_id = ?1 ORDER BY feature ASC",
        )?;
        let raw = stmt
            .query_map(params![run_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(name, q1, q3, upper_bound)| {
                let feature = Feature::from_name(&name).ok_or_else(|| PipelineError::InvalidValue {
                    table: "capping_bound".into(),
                    field: "feature".into(),
                    detail: format!("unknown feature '{name}'"),
                })?;
                Ok(CapBound {
                    feature,
                    q1,
                    q3,
                    iqr: q3 - q1,
                    upper_bound,
                })
            })
            .collect()
    }

    // ── Targeting list ─────────────────────────────────────────

    pub fn save_targeting(&self, run_id: &str, list: &TargetingList) -> PipelineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO targeting_entry (
                    run_id, order_id, user_id, rank, product_id, product_name, probability, selected
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for e in list.entries() {
                stmt.execute(params![
                    run_id,
                    e.order_id as i64,
                    e.user_id as i64,
                    e.rank as i64,
                    e.product_id as i64,
                    e.product_name,
                    e.probability,
                    if e.selected { 1 } else { 0 },
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn targeting_entries(&self, run_id: &str) -> PipelineResult<Vec<TargetingEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id, user_id, rank, product_id, product_name, probability, selected
             FROM targeting_entry WHERE run_id = ?1
             ORDER BY order_id ASC, rank ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(TargetingEntry {
                    order_id: row.get::<_, i64>(0)? as u64,
                    user_id: row.get::<_, i64>(1)? as u64,
                    rank: row.get::<_, i64>(2)? as u32,
                    product_id: row.get::<_, i64>(3)? as u64,
                    product_name: row.get(4)?,
                    probability: row.get(5)?,
                    selected: row.get::<_, i32>(6)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn selected_count(&self, run_id: &str) -> PipelineResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM targeting_entry WHERE run_id = ?1 AND selected = 1",
                params![run_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}
