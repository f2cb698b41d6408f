//! The final triage artifact and its fixed text rendering.

use crate::aggregator::DataGap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseReport {
    pub description: String,
    /// Always within 0..=100.
    pub suspicion_score: u8,
    pub narrative: String,
}

impl CaseReport {
    /// Exactly three sections, in this order, with these headers.
    pub fn render(&self) -> String {
        format!(
            "CASE DESCRIPTION:\n{}\n\nSUSPICION SCORE: {}\n\nNARRATIVE:\n{}\n",
            self.description.trim(),
            self.suspicion_score,
            self.narrative.trim()
        )
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.suspicion_score)
    }

    /// Append a data-limitations paragraph to the narrative when the case
    /// was assessed without some of its records.
    pub fn with_data_limitations(mut self, gaps: &[DataGap]) -> Self {
        if gaps.is_empty() {
            return self;
        }
        let details: Vec<&str> = gaps.iter().map(|g| g.detail.as_str()).collect();
        self.narrative = format!(
            "{}\n\nData limitations: this assessment was made without complete records ({}).",
            self.narrative.trim_end(),
            details.join("; ")
        );
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
}

impl RiskBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => RiskBand::High,
            60..=79 => RiskBand::MediumHigh,
            40..=59 => RiskBand::Medium,
            20..=39 => RiskBand::LowMedium,
            _ => RiskBand::Low,
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskBand::Low => "LOW",
            RiskBand::LowMedium => "LOW-MEDIUM",
            RiskBand::Medium => "MEDIUM",
            RiskBand::MediumHigh => "MEDIUM-HIGH",
            RiskBand::High => "HIGH",
        })
    }
}
