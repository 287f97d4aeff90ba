//! Next-race outcome statistics shared by the threshold and pattern analyses.

use crate::config::AnalysisConfig;
use crate::data::RaceEntry;

/// Outcome statistics over a subset of valid records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeStats {
    pub count: usize,
    pub top3_count: usize,
    pub win_count: usize,
    /// Total payout collected on winners
    pub total_payout: f64,
    /// Return on investment in percent
    pub roi: f64,
}

impl OutcomeStats {
    /// Compute statistics over `entries`.
    ///
    /// `with_payout` is false when the dataset carries no payout column at all,
    /// in which case ROI is reported as 0.
    pub fn compute<'a, I>(entries: I, with_payout: bool, stake_unit: f64) -> Self
    where
        I: IntoIterator<Item = &'a RaceEntry>,
    {
        let mut stats = OutcomeStats::default();

        for entry in entries {
            stats.count += 1;
            if entry.is_top3() {
                stats.top3_count += 1;
            }
            if entry.is_win() {
                stats.win_count += 1;
                stats.total_payout += entry.next_payout.unwrap_or(0.0);
            }
        }

        stats.roi = if with_payout && stats.count > 0 {
            stats.total_payout / (stats.count as f64 * stake_unit) * 100.0
        } else {
            0.0
        };
        stats
    }

    /// Top-3 rate in percent.
    pub fn top3_rate(&self) -> f64 {
        if self.count > 0 {
            self.top3_count as f64 / self.count as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Win rate in percent.
    pub fn win_rate(&self) -> f64 {
        if self.count > 0 {
            self.win_count as f64 / self.count as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn mark(&self, config: &AnalysisConfig) -> RoiMark {
        RoiMark::classify(self.roi, config.strong_roi, config.fair_roi)
    }
}

/// Profitability marker printed next to ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiMark {
    Strong, // ★ ROI >= 100%
    Fair,   // ○ 80% <= ROI < 100%
    None,
}

impl RoiMark {
    pub fn classify(roi: f64, strong: f64, fair: f64) -> Self {
        if roi >= strong {
            RoiMark::Strong
        } else if roi >= fair {
            RoiMark::Fair
        } else {
            RoiMark::None
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            RoiMark::Strong => "★",
            RoiMark::Fair => "○",
            RoiMark::None => "",
        }
    }
}

/// Format a count with comma thousands separators.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
