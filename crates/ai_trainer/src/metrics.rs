//! Classification metrics for held-out evaluation

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Scores for one class or one average row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    #[serde(flatten)]
    pub scores: ClassScores,
}

/// Per-class precision, recall and F1 with accuracy and averages.
///
/// Ratios with a zero denominator are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
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
    /// Build a report over the sorted union of true and predicted labels
    pub fn new<S: AsRef<str>>(y_true: &[S], y_pred: &[S]) -> Self {
        let pairs: Vec<(&str, &str)> = y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t.as_ref(), p.as_ref()))
            .collect();
        let labels: BTreeSet<&str> = pairs.iter().flat_map(|&(t, p)| [t, p]).collect();

        let mut classes = Vec::with_capacity(labels.len());
        for label in labels {
            let tp = pairs.iter().filter(|&&(t, p)| t == label && p == label).count();
            let predicted = pairs.iter().filter(|&&(_, p)| p == label).count();
            let support = pairs.iter().filter(|&&(t, _)| t == label).count();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            classes.push(ClassMetrics {
                label: label.to_string(),
                scores: ClassScores {
                    precision,
                    recall,
                    f1,
                    support,
                },
            });
        }

        let total = pairs.len();
        let correct = pairs.iter().filter(|&&(t, p)| t == p).count();

        let k = classes.len().max(1) as f64;
        let macro_avg = ClassScores {
            precision: classes.iter().map(|c| c.scores.precision).sum::<f64>() / k,
            recall: classes.iter().map(|c| c.scores.recall).sum::<f64>() / k,
            f1: classes.iter().map(|c| c.scores.f1).sum::<f64>() / k,
            support: total,
        };

        let weighted = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                return 0.0;
            }
            classes
                .iter()
                .map(|c| f(&c.scores) * c.scores.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = ClassScores {
            precision: weighted(|s| s.precision),
            recall: weighted(|s| s.recall),
            f1: weighted(|s| s.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
            total,
        }
    }

    pub fn class(&self, label: &str) -> Option<&ClassScores> {
        self.classes.iter().find(|c| c.label == label).map(|c| &c.scores)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|c| c.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or_default();

        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;

        let row = |f: &mut fmt::Formatter<'_>, name: &str, s: &ClassScores| {
            writeln!(
                f,
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, s.precision, s.recall, s.f1, s.support
            )
        };

        for class in &self.classes {
            row(f, &class.label, &class.scores)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}
