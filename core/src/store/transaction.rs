use super::{placeholders, RecordStore};
use crate::{
    error::TriageResult,
    records::{SourceResult, TransactionRecord, TransactionSource},
    types::AccountId,
};
use rusqlite::{params, params_from_iter, types::Value};

const SOURCE: &str = "transaction";

impl RecordStore {
    // ── Transactions ──────────────────────────────────────────────

    pub fn insert_transactions(&self, transactions: &[TransactionRecord]) -> TriageResult<usize> {
        self.in_transaction(|tx| {
            let mut stmt = tx.prepare(
                "INSERT INTO txn (transaction_id, account_id, customer_id, txn_date, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for t in transactions {
                stmt.execute(params![
                    &t.transaction_id,
                    &t.account_id,
                    &t.customer_id,
                    t.date,
                    t.amount
                ])?;
            }
            Ok(transactions.len())
        })
    }
}

impl TransactionSource for RecordStore {
    /// Rows for the customer or any of the given accounts, in insertion order.
    fn transactions_for(
        &self,
        customer_id: &str,
        account_ids: &[AccountId],
    ) -> SourceResult<Vec<TransactionRecord>> {
        let mut sql = String::from(
            "SELECT transaction_id, account_id, customer_id, txn_date, amount
             FROM txn WHERE customer_id = ?1",
        );
        if !account_ids.is_empty() {
            sql.push_str(&format!(
                " OR account_id IN ({})",
                placeholders(2, account_ids.len())
            ));
        }
        sql.push_str(" ORDER BY row_id");

        let mut values = Vec::with_capacity(account_ids.len() + 1);
        values.push(Value::Text(customer_id.to_string()));
        values.extend(account_ids.iter().map(|a| Value::Text(a.clone())));

        self.read(SOURCE, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok(TransactionRecord {
                    transaction_id: row.get(0)?,
                    account_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    date: row.get(3)?,
                    amount: row.get(4)?,
                })
            })?;
            rows.collect()
        })
    }
}
