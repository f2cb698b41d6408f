use super::{join_ids, placeholders, split_ids, RecordStore};
use crate::{
    error::TriageResult,
    records::{PriorCase, PriorCaseSource, SourceResult},
    types::CaseId,
};
use rusqlite::{params, params_from_iter, Row};

const SOURCE: &str = "case history";

const COLUMNS: &str =
    "case_id, customer_id, account_ids, transaction_ids, disposition_reason, tier_closed";

fn prior_case_from_row(row: &Row<'_>) -> rusqlite::Result<PriorCase> {
    Ok(PriorCase {
        case_id: row.get(0)?,
        customer_id: row.get(1)?,
        account_ids: split_ids(&row.get::<_, String>(2)?),
        transaction_ids: split_ids(&row.get::<_, String>(3)?),
        disposition_reason: row.get(4)?,
        tier_closed: row.get(5)?,
    })
}

impl RecordStore {
    // ── Prior cases ───────────────────────────────────────────────

    pub fn insert_prior_cases(&self, cases: &[PriorCase]) -> TriageResult<usize> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO prior_case ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ))?;
            for p in cases {
                stmt.execute(params![
                    &p.case_id,
                    &p.customer_id,
                    join_ids(&p.account_ids),
                    join_ids(&p.transaction_ids),
                    &p.disposition_reason,
                    &p.tier_closed,
                ])?;
            }
            Ok(cases.len())
        })
    }
}

impl PriorCaseSource for RecordStore {
    fn cases_by_ids(&self, case_ids: &[CaseId]) -> SourceResult<Vec<PriorCase>> {
        if case_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {COLUMNS} FROM prior_case WHERE case_id IN ({}) ORDER BY row_id",
            placeholders(1, case_ids.len())
        );
        self.read(SOURCE, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(case_ids.iter()), prior_case_from_row)?;
            rows.collect()
        })
    }

    fn cases_for_customer(&self, customer_id: &str) -> SourceResult<Vec<PriorCase>> {
        self.read(SOURCE, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM prior_case WHERE customer_id = ?1 ORDER BY row_id"
            ))?;
            let rows = stmt.query_map(params![customer_id], prior_case_from_row)?;
            rows.collect()
        })
    }
}
