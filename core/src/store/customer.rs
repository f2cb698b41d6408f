use super::{join_ids, split_ids, RecordStore};
use crate::{
    error::TriageResult,
    records::{CustomerProfile, CustomerSource, SourceResult},
};
use rusqlite::params;

const SOURCE: &str = "customer";

impl RecordStore {
    // ── Customer ──────────────────────────────────────────────────

    /// Insert profiles in one transaction. Returns rows written.
    pub fn insert_customers(&self, customers: &[CustomerProfile]) -> TriageResult<usize> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO customer (
                    customer_id, name, accounts, employer, location, occupation, age
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for c in customers {
                stmt.execute(params![
                    &c.customer_id,
                    &c.name,
                    join_ids(&c.accounts),
                    &c.employer,
                    &c.location,
                    &c.occupation,
                    c.age.map(i64::from),
                ])?;
            }
            Ok(customers.len())
        })
    }
}

impl CustomerSource for RecordStore {
    fn customers_by_id(&self, customer_id: &str) -> SourceResult<Vec<CustomerProfile>> {
        self.read(SOURCE, |conn| {
            let mut stmt = conn.prepare(
                "SELECT customer_id, name, accounts, employer, location, occupation, age
                 FROM customer WHERE customer_id = ?1 ORDER BY row_id",
            )?;
            let rows = stmt.query_map(params![customer_id], |row| {
                Ok(CustomerProfile {
                    customer_id: row.get(0)?,
                    name: row.get(1)?,
                    accounts: split_ids(&row.get::<_, String>(2)?),
                    employer: row.get(3)?,
                    location: row.get(4)?,
                    occupation: row.get(5)?,
                    age: row
                        .get::<_, Option<i64>>(6)?
                        .and_then(|a| u32::try_from(a).ok()),
                })
            })?;
            rows.collect()
        })
    }
}
