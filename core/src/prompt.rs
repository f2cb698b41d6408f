//! Prompt construction: renders a `CaseContext` into the fixed two-part
//! prompt sent to the reasoning service.
//!
//! RULES:
//!   - Same context, same config → byte-identical prompt.
//!   - System + user text never exceeds `max_chars` characters.
//!   - Over the limit, the oldest transaction lines go first, then
//!     prior-case lines from the end of the list, and only then is the
//!     user part cut short.

use crate::{
    aggregator::CaseContext,
    analytics::{
        compare_flagged, risk_indicators, summarize, summarize_comparisons, RiskIndicator,
        TransactionComparison, TransactionSummary,
    },
    config::AnalyticsConfig,
    records::{PriorCase, TransactionRecord},
    warning::Warning,
};
use std::fmt::Write as _;

pub const SYSTEM_PROMPT: &str = "\
You are a senior anti-money-laundering analyst triaging an alert case. \
You receive the case identifiers, the customer profile, a statistical summary \
of the customer's transaction history, rule-based risk indicators, the \
transactions themselves and any prior cases, all drawn from the bank's records.

Assess how unusual the activity is against the customer's own history and \
profile. Weigh how each flagged transaction compares with its own account's \
history, statistical outliers, monthly and frequency spikes, account volatility, \
round-amount patterns and prior case dispositions. Use only the data \
provided; where data is missing, say so rather than guessing.

Score guidance:
- 80-100: multiple extreme outliers or activity drastically out of pattern, repeated prior cases
- 60-79: significant outliers or notable deviations, prior cases on file
- 40-59: moderate deviations, some inconsistencies
- 0-39: consistent with historical behaviour

Reply in exactly this format and nothing else:

CASE DESCRIPTION:
<two to four sentences summarizing the case and the key risk factors>

SUSPICION SCORE: <integer from 0 to 100>

NARRATIVE:
<a professional narrative covering the transaction baseline, the deviations \
found, prior case history, data limitations and a recommendation>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// A rendered prompt plus what had to be left out to fit.
#[derive(Debug, Clone)]
pub struct PromptBuild {
    pub prompt: Prompt,
    pub transactions_dropped: usize,
    pub prior_cases_dropped: usize,
    pub hard_cut: bool,
}

impl PromptBuild {
    pub fn truncated(&self) -> bool {
        self.transactions_dropped > 0 || self.prior_cases_dropped > 0 || self.hard_cut
    }

    pub fn truncation_warning(&self) -> Option<Warning> {
        self.truncated().then(|| Warning::PromptTruncated {
            transactions_dropped: self.transactions_dropped,
            prior_cases_dropped: self.prior_cases_dropped,
            hard_cut: self.hard_cut,
        })
    }
}

/// Statistics are computed over the full context even when transaction
/// lines are later dropped to fit.
pub fn build_prompt(ctx: &CaseContext, analytics: &AnalyticsConfig, max_chars: usize) -> PromptBuild {
    let summary = summarize(&ctx.transactions);
    let indicators = risk_indicators(&ctx.transactions, analytics);
    let comparisons = compare_flagged(ctx, analytics);
    let sections = Sections {
        ctx,
        summary: &summary,
        indicators: &indicators,
        comparisons: &comparisons,
    };

    let system_len = SYSTEM_PROMPT.chars().count();
    let budget = max_chars.saturating_sub(system_len);
    let fits = |user: &str| user.chars().count() <= budget;

    let all_txns = ctx.transactions.len();
    let all_cases = ctx.prior_cases.len();

    let full = sections.render(all_txns, all_cases);
    if fits(&full) {
        return finish(full, 0, 0, false);
    }

    // Most recent `k` transactions kept. Length grows with `k`, so the
    // largest fitting `k` can be found by bisection.
    let kept_txns = largest_fitting(all_txns, |k| fits(&sections.render(k, all_cases)));
    if let Some(k) = kept_txns {
        return finish(sections.render(k, all_cases), all_txns - k, 0, false);
    }

    let kept_cases = largest_fitting(all_cases, |j| fits(&sections.render(0, j)));
    if let Some(j) = kept_cases {
        return finish(sections.render(0, j), all_txns, all_cases - j, false);
    }

    let cut: String = sections.render(0, 0).chars().take(budget).collect();
    finish(cut, all_txns, all_cases, true)
}

fn finish(user: String, transactions_dropped: usize, prior_cases_dropped: usize, hard_cut: bool) -> PromptBuild {
    PromptBuild {
        prompt: Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
        },
        transactions_dropped,
        prior_cases_dropped,
        hard_cut,
    }
}

/// Largest `n` in `0..=max` with `ok(n)`, assuming `ok` is monotone
/// (true up to some point, false after). `None` if even `ok(0)` fails.
fn largest_fitting(max: usize, ok: impl Fn(usize) -> bool) -> Option<usize> {
    if !ok(0) {
        return None;
    }
    let (mut lo, mut hi) = (0usize, max);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if ok(mid) {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    Some(lo)
}

struct Sections<'a> {
    ctx: &'a CaseContext,
    summary: &'a TransactionSummary,
    indicators: &'a [RiskIndicator],
    comparisons: &'a [TransactionComparison],
}

fn or_none(list: &[String]) -> String {
    if list.is_empty() {
        "none".to_string()
    } else {
        list.join(", ")
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("not on file")
}

impl Sections<'_> {
    /// Render the user part with the newest `txns` transactions and the
    /// first `cases` prior cases.
    fn render(&self, txns: usize, cases: usize) -> String {
        let mut out = String::new();
        self.identifiers(&mut out);
        self.profile(&mut out);
        self.statistics(&mut out);
        self.comparison(&mut out);
        self.transactions(&mut out, txns);
        self.prior_cases(&mut out, cases);
        self.gaps(&mut out);
        out.push_str("Assess this case and reply in the required format.\n");
        out
    }

    fn identifiers(&self, out: &mut String) {
        let r = &self.ctx.reference;
        let _ = writeln!(out, "CASE IDENTIFIERS");
        let _ = writeln!(out, "- Case ID: {}", r.case_id);
        let _ = writeln!(out, "- Customer ID: {}", r.customer_id);
        let _ = writeln!(
            out,
            "- Customer name (as referenced): {}",
            r.customer_name.as_deref().unwrap_or("not provided")
        );
        let _ = writeln!(out, "- Referenced accounts: {}", or_none(&r.account_ids));
        let _ = writeln!(out, "- Flagged transactions: {}", or_none(&r.transaction_ids));
        let _ = writeln!(out, "- Referenced prior cases: {}", or_none(&r.prior_case_ids));
        out.push('\n');
    }

    fn profile(&self, out: &mut String) {
        let _ = writeln!(out, "CUSTOMER PROFILE");
        match &self.ctx.profile {
            None => {
                let _ = writeln!(out, "- No customer profile available.");
            }
            Some(p) => {
                let _ = writeln!(out, "- Name: {}", p.name);
                let _ = writeln!(out, "- Accounts on file: {}", or_none(&p.accounts));
                let _ = writeln!(out, "- Employer: {}", opt(&p.employer));
                let _ = writeln!(out, "- Occupation: {}", opt(&p.occupation));
                let _ = writeln!(out, "- Location: {}", opt(&p.location));
                match p.age {
                    Some(age) => {
                        let _ = writeln!(out, "- Age: {age}");
                    }
                    None => {
                        let _ = writeln!(out, "- Age: not on file");
                    }
                }
            }
        }
        out.push('\n');
    }

    fn statistics(&self, out: &mut String) {
        let s = self.summary;
        let _ = writeln!(out, "TRANSACTION STATISTICS");
        if s.count == 0 {
            let _ = writeln!(out, "- No transactions available.");
            out.push('\n');
            return;
        }
        let _ = writeln!(out, "- Transactions: {}", s.count);
        let _ = writeln!(out, "- Total amount: {:.2}", s.total);
        let _ = writeln!(out, "- Mean: {:.2}  Median: {:.2}  Std dev: {:.2}", s.mean, s.median, s.std_dev);
        let _ = writeln!(out, "- Range: {:.2} to {:.2}", s.min, s.max);
        if let (Some(first), Some(last)) = (s.first_date, s.last_date) {
            let _ = writeln!(out, "- Period: {first} to {last}");
        }
        let _ = writeln!(out, "- Accounts involved: {}", s.unique_accounts);
        let _ = writeln!(
            out,
            "- Months covered: {}  Average monthly total: {:.2}",
            s.months_covered, s.avg_monthly_total
        );
        out.push('\n');

        let _ = writeln!(out, "RISK INDICATORS");
        if self.indicators.is_empty() {
            let _ = writeln!(out, "- None detected.");
        }
        for ind in self.indicators {
            let _ = writeln!(out, "- [{}] {}", ind.severity.as_str(), ind.description);
        }
        out.push('\n');
    }

    fn comparison(&self, out: &mut String) {
        if self.ctx.reference.transaction_ids.is_empty() {
            return;
        }
        let _ = writeln!(out, "FLAGGED TRANSACTION COMPARISON (against the same account's history)");
        let Some(s) = summarize_comparisons(self.comparisons) else {
            let _ = writeln!(out, "- Not enough account history to compare the flagged transactions.");
            out.push('\n');
            return;
        };
        let _ = writeln!(
            out,
            "- Compared: {}  High risk: {}  Medium risk: {}  Outliers: {}  Max |z|: {:.2}  Combined score: {}",
            s.compared, s.high_risk, s.medium_risk, s.outliers, s.max_abs_z, s.combined_score
        );
        for c in self.comparisons {
            let _ = writeln!(
                out,
                "- {} | {} | account {} | {:.2} vs mean {:.2} (median {:.2}, std dev {:.2}, {} rows) | z {:.2} | {:.0}% deviation | percentile {:.0} | {} risk, score {}",
                c.transaction_id,
                c.date,
                c.account_id,
                c.amount,
                c.history_mean,
                c.history_median,
                c.history_std_dev,
                c.history_count,
                c.z_score,
                c.percentage_deviation,
                c.percentile_rank,
                c.risk_level.as_str(),
                c.risk_score
            );
            if !c.reasons.is_empty() {
                let _ = writeln!(out, "  reasons: {}", c.reasons.join("; "));
            }
        }
        out.push('\n');
    }

    fn transaction_line(&self, t: &TransactionRecord) -> String {
        let flag = if self.ctx.is_flagged(t) { "  [FLAGGED]" } else { "" };
        format!(
            "- {} | {} | account {} | {:.2}{flag}",
            t.date,
            t.transaction_id.as_deref().unwrap_or("-"),
            t.account_id,
            t.amount
        )
    }

    fn transactions(&self, out: &mut String, keep: usize) {
        let all = &self.ctx.transactions;
        if all.is_empty() {
            return;
        }
        let keep = keep.min(all.len());
        let omitted = all.len() - keep;
        let _ = writeln!(out, "TRANSACTION HISTORY (oldest first)");
        if omitted > 0 {
            let _ = writeln!(out, "- {omitted} older transactions omitted to fit the size limit.");
        }
        for t in &all[omitted..] {
            let _ = writeln!(out, "{}", self.transaction_line(t));
        }
        out.push('\n');
    }

    fn prior_case_line(p: &PriorCase) -> String {
        let tier = p.tier_closed.as_deref().unwrap_or("unknown");
        let reason = if p.disposition_reason.trim().is_empty() {
            "not recorded"
        } else {
            p.disposition_reason.trim()
        };
        format!(
            "- {} | closed at tier {tier} | accounts {} | transactions {} | disposition: {reason}",
            p.case_id,
            or_none(&p.account_ids),
            or_none(&p.transaction_ids),
        )
    }

    fn prior_cases(&self, out: &mut String, keep: usize) {
        let all = &self.ctx.prior_cases;
        let _ = writeln!(out, "PRIOR CASES");
        if all.is_empty() {
            let _ = writeln!(out, "- None on file.");
        }
        let keep = keep.min(all.len());
        for p in &all[..keep] {
            let _ = writeln!(out, "{}", Self::prior_case_line(p));
        }
        if keep < all.len() {
            let _ = writeln!(out, "- {} further prior cases omitted to fit the size limit.", all.len() - keep);
        }
        out.push('\n');
    }

    fn gaps(&self, out: &mut String) {
        if self.ctx.gaps.is_empty() {
            return;
        }
        let _ = writeln!(out, "DATA GAPS");
        for g in &self.ctx.gaps {
            let _ = writeln!(out, "- {}", g.detail);
        }
        out.push('\n');
    }
}
