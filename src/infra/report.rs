// ============================================================
// Layer 6 — Classification Report
// ============================================================
// Turns the evaluator's (gold, predicted) pairs into per-class
// precision / recall / F1 / support, overall accuracy, and the
// macro and weighted averages, then renders them as a table:
//
//                 precision    recall  f1-score   support
//
//              0     0.6667    1.0000    0.8000         2
//              1     1.0000    0.6667    0.8000         3
//
//       accuracy                         0.8000         5
//      macro avg     0.8333    0.8333    0.8000         5
//   weighted avg     0.8667    0.8000    0.8000         5
//
// A ratio whose denominator is zero is reported as 0; the
// affected cells are listed in a footer under the table.
//
// Reference: Rust Book §8 (Collections), §12 (I/O)

use anyhow::{Context, Result};
use std::{fmt::Write as _, fs, path::Path};

use crate::domain::example::Label;
use crate::domain::prediction::PredictionRecord;

/// Width of the row-name column ("weighted avg")
const NAME_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub support:   usize,
}

/// Raw confusion counts for one class treated as "positive".
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Indexed by `Label::as_int()`
    pub per_class:    [ClassMetrics; 2],
    pub accuracy:     f64,
    pub macro_avg:    ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub total:        usize,

    /// Human-readable list of ratios that fell back to 0
    zero_division: Vec<String>,
}

/// `num / den`, or 0 when `den` is 0.
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 { None } else { Some(num / den) }
}

impl ClassificationReport {
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let mut counts  = [Counts::default(); 2];
        let mut correct = 0usize;

        for r in records {
            if r.is_correct() {
                correct += 1;
                counts[r.gold.as_int() as usize].tp += 1;
            } else {
                counts[r.predicted.as_int() as usize].fp += 1;
                counts[r.gold.as_int() as usize].fn_ += 1;
            }
        }

        let mut zero_division = Vec::new();
        let mut per_class = [ClassMetrics::default(); 2];

        for label in Label::ALL {
            let c = counts[label.as_int() as usize];
            let (tp, fp, fn_) = (c.tp as f64, c.fp as f64, c.fn_ as f64);

            let precision = ratio(tp, tp + fp).unwrap_or_else(|| {
                zero_division.push(format!("precision of class {label}"));
                0.0
            });
            let recall = ratio(tp, tp + fn_).unwrap_or_else(|| {
                zero_division.push(format!("recall of class {label}"));
                0.0
            });
            let f1 = ratio(2.0 * precision * recall, precision + recall).unwrap_or_else(|| {
                zero_division.push(format!("f1-score of class {label}"));
                0.0
            });

            per_class[label.as_int() as usize] = ClassMetrics {
                precision,
                recall,
                f1,
                support: c.tp + c.fn_,
            };
        }

        let total    = records.len();
        let accuracy = ratio(correct as f64, total as f64).unwrap_or_else(|| {
            zero_division.push("accuracy (no predictions)".to_string());
            0.0
        });

        let n = per_class.len() as f64;
        let macro_avg = ClassMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
            recall:    per_class.iter().map(|m| m.recall).sum::<f64>() / n,
            f1:        per_class.iter().map(|m| m.f1).sum::<f64>() / n,
            support:   total,
        };

        let weighted = |f: fn(&ClassMetrics) -> f64| {
            let sum: f64 = per_class.iter().map(|m| f(m) * m.support as f64).sum();
            ratio(sum, total as f64).unwrap_or(0.0)
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|m| m.precision),
            recall:    weighted(|m| m.recall),
            f1:        weighted(|m| m.f1),
            support:   total,
        };

        for cell in &zero_division {
            tracing::warn!("Zero denominator: {} set to 0", cell);
        }

        Self { per_class, accuracy, macro_avg, weighted_avg, total, zero_division }
    }

    pub fn class(&self, label: Label) -> &ClassMetrics {
        &self.per_class[label.as_int() as usize]
    }

    pub fn has_zero_division(&self) -> bool {
        !self.zero_division.is_empty()
    }

    /// Fixed-width table, 4 decimals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{:>w$}  {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support",
            w = NAME_WIDTH
        );

        for label in Label::ALL {
            push_row(&mut out, &label.to_string(), self.class(label));
        }
        out.push('\n');

        let _ = writeln!(
            out,
            "{:>w$}  {:>9} {:>9} {:>9.4} {:>9}",
            "accuracy", "", "", self.accuracy, self.total,
            w = NAME_WIDTH
        );
        push_row(&mut out, "macro avg", &self.macro_avg);
        push_row(&mut out, "weighted avg", &self.weighted_avg);

        if self.has_zero_division() {
            let _ = writeln!(
                out,
                "\nNote: zero denominator, reported as 0: {}",
                self.zero_division.join(", ")
            );
        }
        out
    }

    /// Write the rendered table, replacing any previous report.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
        }
        fs::write(path, self.render())
            .with_context(|| format!("Cannot write report to '{}'", path.display()))?;

        tracing::info!("Report written to '{}'", path.display());
        Ok(())
    }
}

fn push_row(out: &mut String, name: &str, m: &ClassMetrics) {
    let _ = writeln!(
        out,
        "{:>w$}  {:>9.4} {:>9.4} {:>9.4} {:>9}",
        name, m.precision, m.recall, m.f1, m.support,
        w = NAME_WIDTH
    );
}
