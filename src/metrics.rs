//! Binary classification metrics and a precision/recall/F1 report.

use ndarray::Array1;
use std::fmt;

/// Fraction of predictions equal to the truth.
pub fn accuracy(y_true: &Array1<u8>, y_pred: &Array1<u8>) -> f64 {
    assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");

    if y_true.is_empty() {
        return 0.0;
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();

    correct as f64 / y_true.len() as f64
}

/// Per-class scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision / recall / F1 per class plus accuracy and averages.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Index = class label (0, 1)
    pub classes: Vec<ClassScores>,
    pub accuracy: f64,
    pub total: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl ClassificationReport {
    /// Build a report for binary labels; `names[k]` names class `k`.
    pub fn binary(y_true: &Array1<u8>, y_pred: &Array1<u8>, names: [&str; 2]) -> Self {
        assert_eq!(y_true.len(), y_pred.len(), "Arrays must have same length");

        let classes = (0..2u8)
            .map(|class| {
                let mut tp = 0;
                let mut fp = 0;
                let mut fn_ = 0;
                for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
                    match (t == class, p == class) {
                        (true, true) => tp += 1,
                        (false, true) => fp += 1,
                        (true, false) => fn_ += 1,
                        (false, false) => {}
                    }
                }

                let precision = ratio(tp, tp + fp);
                let recall = ratio(tp, tp + fn_);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };

                ClassScores {
                    label: names[class as usize].to_string(),
                    precision,
                    recall,
                    f1,
                    support: tp + fn_,
                }
            })
            .collect();

        Self {
            classes,
            accuracy: accuracy(y_true, y_pred),
            total: y_true.len(),
        }
    }

    /// Unweighted mean of (precision, recall, f1).
    pub fn macro_avg(&self) -> (f64, f64, f64) {
        let n = self.classes.len().max(1) as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            (acc.0 + c.precision, acc.1 + c.recall, acc.2 + c.f1)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }

    /// Support-weighted mean of (precision, recall, f1).
    pub fn weighted_avg(&self) -> (f64, f64, f64) {
        if self.total == 0 {
            return (0.0, 0.0, 0.0);
        }
        let n = self.total as f64;
        let sum = self.classes.iter().fold((0.0, 0.0, 0.0), |acc, c| {
            let w = c.support as f64;
            (acc.0 + c.precision * w, acc.1 + c.recall * w, acc.2 + c.f1 * w)
        });
        (sum.0 / n, sum.1 / n, sum.2 / n)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.chars().count())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;

        for c in &self.classes {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.label, c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;

        let (p, r, f1) = self.macro_avg();
        writeln!(
            f,
            "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg", p, r, f1, self.total
        )?;

        let (p, r, f1) = self.weighted_avg();
        writeln!(
            f,
            "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "weighted avg", p, r, f1, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_accuracy() {
        let y_true = array![0u8, 1, 1, 0, 1];
        let y_pred = array![0u8, 1, 0, 0, 0];
        assert_abs_diff_eq!(accuracy(&y_true, &y_pred), 0.6, epsilon = 1e-12);
        assert_eq!(accuracy(&Array1::zeros(0), &Array1::zeros(0)), 0.0);
    }

    #[test]
    fn test_binary_report_scores() {
        // class 1: tp=2, fp=1, fn=1; class 0: tp=3, fp=1, fn=1
        let y_true = array![1u8, 1, 1, 0, 0, 0, 0];
        let y_pred = array![1u8, 1, 0, 1, 0, 0, 0];
        let report = ClassificationReport::binary(&y_true, &y_pred, ["4th-or-worse", "top-3"]);

        let neg = &report.classes[0];
        assert_eq!(neg.label, "4th-or-worse");
        assert_eq!(neg.support, 4);
        assert_abs_diff_eq!(neg.precision, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(neg.recall, 0.75, epsilon = 1e-12);

        let pos = &report.classes[1];
        assert_eq!(pos.support, 3);
        assert_abs_diff_eq!(pos.precision, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.recall, 2.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(pos.f1, 2.0 / 3.0, epsilon = 1e-12);

        assert_abs_diff_eq!(report.accuracy, 5.0 / 7.0, epsilon = 1e-12);
        let (p, _, _) = report.macro_avg();
        assert_abs_diff_eq!(p, (0.75 + 2.0 / 3.0) / 2.0, epsilon = 1e-12);
        let (_, r, _) = report.weighted_avg();
        assert_abs_diff_eq!(r, (0.75 * 4.0 + 2.0 / 3.0 * 3.0) / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_division_is_zero() {
        // Never predicts class 1
        let y_true = array![1u8, 0, 0];
        let y_pred = array![0u8, 0, 0];
        let report = ClassificationReport::binary(&y_true, &y_pred, ["neg", "pos"]);

        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].recall, 0.0);
        assert_eq!(report.classes[1].f1, 0.0);
    }

    #[test]
    fn test_report_layout() {
        let y_true = array![1u8, 0, 1, 0];
        let y_pred = array![1u8, 0, 0, 0];
        let report = ClassificationReport::binary(&y_true, &y_pred, ["4th-or-worse", "top-3"]);
        let text = report.to_string();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 8);
        assert!(lines[0].ends_with("precision    recall  f1-score   support"));
        assert!(lines[2].trim_start().starts_with("4th-or-worse"));
        assert!(lines[3].trim_start().starts_with("top-3"));
        assert!(lines[5].contains("accuracy"));
        assert!(lines[5].contains("0.75"));
        assert!(lines[7].starts_with("weighted avg"));
    }
}
