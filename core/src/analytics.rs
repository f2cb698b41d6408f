//! Descriptive statistics and rule-based risk indicators over a case's
//! transaction history, plus a per-transaction comparison of flagged
//! transactions against their own account's history. Everything here is a
//! pure function of the context and thresholds; the prompt builder renders
//! the results.

use crate::{
    aggregator::CaseContext,
    config::AnalyticsConfig,
    records::TransactionRecord,
    types::{AccountId, TransactionId},
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; 0 for fewer than two transactions.
    pub std_dev: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub unique_accounts: usize,
    pub months_covered: usize,
    pub avg_monthly_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    AmountOutlier,
    MonthlySpike,
    FrequencySpike,
    AccountVolatility,
    RoundAmountBias,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }

    /// High once the measure passes 1.5x its threshold.
    fn grade(measure: f64, threshold: f64) -> Self {
        if measure > threshold * 1.5 {
            Severity::High
        } else {
            Severity::Medium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub kind: IndicatorKind,
    pub severity: Severity,
    pub description: String,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

pub fn summarize(transactions: &[TransactionRecord]) -> TransactionSummary {
    let amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
    let months: BTreeSet<_> = transactions.iter().map(|t| month_key(t.date)).collect();
    let accounts: BTreeSet<&str> = transactions.iter().map(|t| t.account_id.as_str()).collect();
    let total: f64 = amounts.iter().sum();

    TransactionSummary {
        count: amounts.len(),
        total,
        mean: mean(&amounts),
        median: median(&amounts),
        min: amounts.iter().copied().reduce(f64::min).unwrap_or(0.0),
        max: amounts.iter().copied().reduce(f64::max).unwrap_or(0.0),
        std_dev: sample_std_dev(&amounts),
        first_date: transactions.iter().map(|t| t.date).min(),
        last_date: transactions.iter().map(|t| t.date).max(),
        unique_accounts: accounts.len(),
        months_covered: months.len(),
        avg_monthly_total: if months.is_empty() {
            0.0
        } else {
            total / months.len() as f64
        },
    }
}

/// Indicators in a fixed order: amount outliers (transaction order),
/// monthly spikes then frequency spikes (calendar order), volatile accounts
/// (account id order), then round-amount bias.
pub fn risk_indicators(
    transactions: &[TransactionRecord],
    cfg: &AnalyticsConfig,
) -> Vec<RiskIndicator> {
    if transactions.len() < cfg.min_transactions.max(2) {
        return Vec::new();
    }
    let mut out = Vec::new();
    amount_outliers(transactions, cfg, &mut out);
    monthly_spikes(transactions, cfg, &mut out);
    frequency_spikes(transactions, cfg, &mut out);
    volatile_accounts(transactions, cfg, &mut out);
    round_amount_bias(transactions, cfg, &mut out);
    out
}

fn amount_outliers(txns: &[TransactionRecord], cfg: &AnalyticsConfig, out: &mut Vec<RiskIndicator>) {
    let amounts: Vec<f64> = txns.iter().map(|t| t.amount).collect();
    let (m, sd) = (mean(&amounts), sample_std_dev(&amounts));
    if sd <= 0.0 {
        return;
    }
    for t in txns {
        let z = ((t.amount - m) / sd).abs();
        if z > cfg.outlier_z_threshold {
            let id = t.transaction_id.as_deref().unwrap_or("(no id)");
            out.push(RiskIndicator {
                kind: IndicatorKind::AmountOutlier,
                severity: Severity::grade(z, cfg.outlier_z_threshold),
                description: format!(
                    "Transaction {id} of {:.2} on {} in account {} is {z:.2} standard deviations from the mean of {m:.2}",
                    t.amount, t.date, t.account_id
                ),
            });
        }
    }
}

fn monthly_spikes(txns: &[TransactionRecord], cfg: &AnalyticsConfig, out: &mut Vec<RiskIndicator>) {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for t in txns {
        *by_month.entry(month_key(t.date)).or_default() += t.amount;
    }
    if by_month.len() < 2 {
        return;
    }
    let totals: Vec<f64> = by_month.values().copied().collect();
    let (m, sd) = (mean(&totals), sample_std_dev(&totals));
    if sd <= 0.0 {
        return;
    }
    for ((year, month), total) in &by_month {
        let z = ((total - m) / sd).abs();
        if z > cfg.monthly_z_threshold {
            out.push(RiskIndicator {
                kind: IndicatorKind::MonthlySpike,
                severity: Severity::grade(z, cfg.monthly_z_threshold),
                description: format!(
                    "Monthly total {total:.2} in {year}-{month:02} deviates from the typical month ({m:.2}) by {z:.2} standard deviations"
                ),
            });
        }
    }
}

/// Months whose transaction count stands out. Always medium: a busy month
/// is context, not evidence on its own.
fn frequency_spikes(txns: &[TransactionRecord], cfg: &AnalyticsConfig, out: &mut Vec<RiskIndicator>) {
    let mut by_month: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for t in txns {
        *by_month.entry(month_key(t.date)).or_default() += 1;
    }
    if by_month.len() < 2 {
        return;
    }
    let counts: Vec<f64> = by_month.values().map(|&c| c as f64).collect();
    let (m, sd) = (mean(&counts), sample_std_dev(&counts));
    if sd <= 0.0 {
        return;
    }
    for ((year, month), count) in &by_month {
        let z = (*count as f64 - m) / sd;
        if z > cfg.frequency_z_threshold {
            out.push(RiskIndicator {
                kind: IndicatorKind::FrequencySpike,
                severity: Severity::Medium,
                description: format!(
                    "{count} transactions in {year}-{month:02} against a typical {m:.1} per month ({z:.2} standard deviations above)"
                ),
            });
        }
    }
}

fn volatile_accounts(
    txns: &[TransactionRecord],
    cfg: &AnalyticsConfig,
    out: &mut Vec<RiskIndicator>,
) {
    let mut by_account: BTreeMap<&AccountId, Vec<f64>> = BTreeMap::new();
    for t in txns {
        by_account.entry(&t.account_id).or_default().push(t.amount);
    }
    for (account, amounts) in by_account {
        if amounts.len() < 3 {
            continue;
        }
        let m = mean(&amounts);
        if m <= 0.0 {
            continue;
        }
        let cv = sample_std_dev(&amounts) / m;
        if cv > cfg.volatility_threshold {
            out.push(RiskIndicator {
                kind: IndicatorKind::AccountVolatility,
                severity: Severity::grade(cv, cfg.volatility_threshold),
                description: format!(
                    "Account {account} shows high volatility (coefficient of variation {cv:.2})"
                ),
            });
        }
    }
}

fn is_round(amount: f64) -> bool {
    amount.fract() == 0.0 && (amount as i64) % 100 == 0
}

fn round_amount_bias(
    txns: &[TransactionRecord],
    cfg: &AnalyticsConfig,
    out: &mut Vec<RiskIndicator>,
) {
    if txns.len() < 5 {
        return;
    }
    let round = txns.iter().filter(|t| is_round(t.amount)).count();
    let ratio = round as f64 / txns.len() as f64;
    if ratio > cfg.round_amount_ratio {
        out.push(RiskIndicator {
            kind: IndicatorKind::RoundAmountBias,
            severity: Severity::Medium,
            description: format!(
                "{:.0}% of transactions ({round} of {}) are round amounts, which may indicate structuring",
                ratio * 100.0,
                txns.len()
            ),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

/// One flagged transaction measured against the rest of its account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionComparison {
    pub transaction_id: TransactionId,
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub amount: f64,
    /// Unflagged transactions of the same account the amount is measured against.
    pub history_count: usize,
    pub history_mean: f64,
    pub history_median: f64,
    pub history_std_dev: f64,
    /// Signed; 0 when the history has no spread.
    pub z_score: f64,
    /// |amount - mean| as a percentage of the mean; 0 for a non-positive mean.
    pub percentage_deviation: f64,
    /// Share of history at or below the amount, 0-100.
    pub percentile_rank: f64,
    pub is_outlier: bool,
    pub is_extreme_outlier: bool,
    pub risk_level: RiskLevel,
    /// 0-100.
    pub risk_score: u8,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub compared: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    pub outliers: usize,
    pub extreme_outliers: usize,
    pub max_abs_z: f64,
    pub mean_abs_z: f64,
    /// Sum of the individual scores, capped at 100.
    pub combined_score: u8,
}

/// Compare every flagged transaction against the unflagged history of its
/// own account. Transactions whose account has fewer than
/// `min_transactions` history rows are skipped. Output follows the context's
/// transaction order.
pub fn compare_flagged(ctx: &CaseContext, cfg: &AnalyticsConfig) -> Vec<TransactionComparison> {
    let mut history: BTreeMap<&AccountId, Vec<f64>> = BTreeMap::new();
    for t in ctx.transactions.iter().filter(|t| !ctx.is_flagged(t)) {
        history.entry(&t.account_id).or_default().push(t.amount);
    }

    ctx.transactions
        .iter()
        .filter(|t| ctx.is_flagged(t))
        .filter_map(|t| {
            let amounts = history.get(&t.account_id)?;
            if amounts.len() < cfg.min_transactions.max(2) {
                return None;
            }
            let id = t.transaction_id.clone()?;
            Some(compare_one(t, id, amounts, cfg))
        })
        .collect()
}

fn compare_one(
    t: &TransactionRecord,
    transaction_id: TransactionId,
    history: &[f64],
    cfg: &AnalyticsConfig,
) -> TransactionComparison {
    let (m, sd) = (mean(history), sample_std_dev(history));
    let z = if sd > 0.0 { (t.amount - m) / sd } else { 0.0 };
    let deviation = if m > 0.0 { (t.amount - m).abs() / m * 100.0 } else { 0.0 };
    let at_or_below = history.iter().filter(|&&a| a <= t.amount).count();
    let percentile = at_or_below as f64 / history.len() as f64 * 100.0;

    let mut reasons = Vec::new();
    let (level, mut score) = if z.abs() > cfg.comparison_high_z {
        reasons.push(format!("extreme deviation ({z:.2} standard deviations)"));
        (RiskLevel::High, 40u32)
    } else if z.abs() > cfg.comparison_medium_z {
        reasons.push(format!("significant deviation ({z:.2} standard deviations)"));
        (RiskLevel::Medium, 25)
    } else if deviation > cfg.comparison_deviation_pct {
        reasons.push(format!("{deviation:.0}% away from the account average"));
        (RiskLevel::Medium, 20)
    } else {
        (RiskLevel::Low, 0)
    };

    if sd > 0.0 {
        let band = cfg.comparison_medium_z * sd;
        if t.amount > m + band {
            reasons.push("well above the account's normal range".into());
            score += 15;
        } else if t.amount < m - band {
            reasons.push("well below the account's normal range".into());
            score += 10;
        }
    }
    if !(5.0..=95.0).contains(&percentile) {
        reasons.push(format!("at the {percentile:.0}th percentile of the account's history"));
        score += 10;
    }

    TransactionComparison {
        transaction_id,
        account_id: t.account_id.clone(),
        date: t.date,
        amount: t.amount,
        history_count: history.len(),
        history_mean: m,
        history_median: median(history),
        history_std_dev: sd,
        z_score: z,
        percentage_deviation: deviation,
        percentile_rank: percentile,
        is_outlier: z.abs() > cfg.comparison_medium_z,
        is_extreme_outlier: z.abs() > cfg.comparison_high_z,
        risk_level: level,
        risk_score: score.min(100) as u8,
        reasons,
    }
}

/// `None` when nothing was compared.
pub fn summarize_comparisons(comparisons: &[TransactionComparison]) -> Option<ComparisonSummary> {
    if comparisons.is_empty() {
        return None;
    }
    let count = |level: RiskLevel| comparisons.iter().filter(|c| c.risk_level == level).count();
    let abs_z: Vec<f64> = comparisons.iter().map(|c| c.z_score.abs()).collect();
    let combined: u32 = comparisons.iter().map(|c| u32::from(c.risk_score)).sum();
    Some(ComparisonSummary {
        compared: comparisons.len(),
        high_risk: count(RiskLevel::High),
        medium_risk: count(RiskLevel::Medium),
        low_risk: count(RiskLevel::Low),
        outliers: comparisons.iter().filter(|c| c.is_outlier).count(),
        extreme_outliers: comparisons.iter().filter(|c| c.is_extreme_outlier).count(),
        max_abs_z: abs_z.iter().copied().fold(0.0, f64::max),
        mean_abs_z: mean(&abs_z),
        combined_score: combined.min(100) as u8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txn(account: &str, date: &str, amount: f64) -> TransactionRecord {
        TransactionRecord {
            transaction_id: None,
            account_id: account.into(),
            customer_id: "CUST1".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            amount,
        }
    }

    #[test]
    fn summary_of_empty_history_is_zeroed() {
        let s = summarize(&[]);
        assert_eq!(s.count, 0);
        assert_eq!(s.total, 0.0);
        assert_eq!(s.first_date, None);
        assert_eq!(s.months_covered, 0);
    }

    #[test]
    fn summary_uses_sample_std_dev_and_median() {
        let txns = vec![
            txn("A", "2024-01-05", 100.0),
            txn("A", "2024-01-20", 200.0),
            txn("B", "2024-02-03", 300.0),
            txn("B", "2024-03-09", 400.0),
        ];
        let s = summarize(&txns);
        assert_eq!(s.count, 4);
        assert_eq!(s.total, 1000.0);
        assert_eq!(s.median, 250.0);
        assert!((s.std_dev - 129.0994).abs() < 1e-3);
        assert_eq!(s.unique_accounts, 2);
        assert_eq!(s.months_covered, 3);
        assert_eq!(s.min, 100.0);
        assert_eq!(s.max, 400.0);
    }

    #[test]
    fn single_large_transaction_is_an_outlier() {
        let mut txns: Vec<_> = (1..=20)
            .map(|d| txn("A", &format!("2024-01-{d:02}"), 100.0 + d as f64))
            .collect();
        txns.push(txn("A", "2024-01-25", 25_000.0));
        let found = risk_indicators(&txns, &AnalyticsConfig::default());
        assert!(found
            .iter()
            .any(|r| r.kind == IndicatorKind::AmountOutlier && r.severity == Severity::High));
    }

    #[test]
    fn round_amounts_flag_structuring() {
        let txns: Vec<_> = (1..=6)
            .map(|d| txn("A", &format!("2024-01-{d:02}"), 9_000.0 + d as f64 * 100.0))
            .collect();
        let found = risk_indicators(&txns, &AnalyticsConfig::default());
        assert!(found.iter().any(|r| r.kind == IndicatorKind::RoundAmountBias));
    }

    #[test]
    fn busy_month_is_a_frequency_spike() {
        let mut txns: Vec<_> = (1..=6)
            .map(|m| txn("A", &format!("2024-{m:02}-05"), 2_000.0))
            .collect();
        txns.extend((1..=4).map(|d| txn("A", &format!("2024-07-{d:02}"), 500.0)));
        let found = risk_indicators(&txns, &AnalyticsConfig::default());
        let spike = found
            .iter()
            .find(|r| r.kind == IndicatorKind::FrequencySpike)
            .expect("frequency spike");
        assert_eq!(spike.severity, Severity::Medium);
        assert!(spike.description.starts_with("4 transactions in 2024-07"), "{}", spike.description);
    }

    #[test]
    fn even_activity_has_no_frequency_spike() {
        let txns: Vec<_> = (1..=6)
            .flat_map(|m| {
                [
                    txn("A", &format!("2024-{m:02}-05"), 2_000.0),
                    txn("A", &format!("2024-{m:02}-20"), 2_100.0),
                ]
            })
            .collect();
        let found = risk_indicators(&txns, &AnalyticsConfig::default());
        assert!(!found.iter().any(|r| r.kind == IndicatorKind::FrequencySpike));
    }

    #[test]
    fn far_outlier_scores_high() {
        let history = [1_000.0, 1_100.0, 900.0, 1_050.0, 950.0];
        let mut t = txn("A", "2024-02-01", 9_000.0);
        t.transaction_id = Some("F1".into());
        let c = compare_one(&t, "F1".into(), &history, &AnalyticsConfig::default());
        assert_eq!(c.history_count, 5);
        assert_eq!(c.history_mean, 1_000.0);
        assert!(c.z_score > 3.0);
        assert!(c.is_outlier && c.is_extreme_outlier);
        assert_eq!(c.risk_level, RiskLevel::High);
        assert_eq!(c.percentile_rank, 100.0);
        // 40 base, 15 above the band, 10 for the percentile.
        assert_eq!(c.risk_score, 65);
        assert_eq!(c.percentage_deviation, 800.0);
    }

    #[test]
    fn typical_amount_scores_low() {
        let history = [1_000.0, 1_100.0, 900.0, 1_050.0, 950.0];
        let t = txn("A", "2024-02-01", 1_020.0);
        let c = compare_one(&t, "F2".into(), &history, &AnalyticsConfig::default());
        assert_eq!(c.risk_level, RiskLevel::Low);
        assert_eq!(c.risk_score, 0);
        assert!(!c.is_outlier);
        assert!(c.reasons.is_empty());
        assert_eq!(c.percentile_rank, 60.0);
    }

    #[test]
    fn flat_history_falls_back_to_percentage_deviation() {
        let history = [500.0, 500.0, 500.0];
        let t = txn("A", "2024-02-01", 800.0);
        let c = compare_one(&t, "F3".into(), &history, &AnalyticsConfig::default());
        assert_eq!(c.z_score, 0.0);
        assert_eq!(c.risk_level, RiskLevel::Medium);
        // 20 for a 60% deviation, 10 for the percentile.
        assert_eq!(c.risk_score, 30);
    }

    #[test]
    fn comparison_summary_counts_levels() {
        let history = [1_000.0, 1_100.0, 900.0, 1_050.0, 950.0];
        let cfg = AnalyticsConfig::default();
        let high = compare_one(&txn("A", "2024-02-01", 9_000.0), "F1".into(), &history, &cfg);
        let low = compare_one(&txn("A", "2024-02-02", 1_020.0), "F2".into(), &history, &cfg);
        let s = summarize_comparisons(&[high.clone(), low]).unwrap();
        assert_eq!(s.compared, 2);
        assert_eq!((s.high_risk, s.medium_risk, s.low_risk), (1, 0, 1));
        assert_eq!(s.outliers, 1);
        assert_eq!(s.extreme_outliers, 1);
        assert_eq!(s.max_abs_z, high.z_score.abs());
        assert_eq!(s.combined_score, 65);
        assert!(summarize_comparisons(&[]).is_none());
    }

    #[test]
    fn too_few_transactions_yield_no_indicators() {
        let txns = vec![txn("A", "2024-01-01", 10.0), txn("A", "2024-01-02", 90_000.0)];
        assert!(risk_indicators(&txns, &AnalyticsConfig::default()).is_empty());
    }
}
