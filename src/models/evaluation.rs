//! Held-out evaluation of a trained classifier.
//!
//! Reporting only: nothing here is persisted with the artifact set.

use std::fmt;

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Binary confusion matrix, fraud as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(predicted: &[bool], labels: &[bool]) -> Self {
        let mut matrix = Self::default();
        for (&p, &l) in predicted.iter().zip(labels) {
            match (l, p) {
                (false, false) => matrix.true_negatives += 1,
                (false, true) => matrix.false_positives += 1,
                (true, false) => matrix.false_negatives += 1,
                (true, true) => matrix.true_positives += 1,
            }
        }
        matrix
    }

    /// Metrics for the legitimate class (label 0)
    pub fn negative_class(&self) -> ClassMetrics {
        class_metrics(self.true_negatives, self.false_negatives, self.false_positives)
    }

    /// Metrics for the fraud class (label 1)
    pub fn positive_class(&self) -> ClassMetrics {
        class_metrics(self.true_positives, self.false_positives, self.false_negatives)
    }
}

fn class_metrics(tp: usize, fp: usize, fn_: usize) -> ClassMetrics {
    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    ClassMetrics {
        precision,
        recall,
        f1,
        support: tp + fn_,
    }
}

/// Area under the ROC curve (Mann-Whitney U, ties count one half).
///
/// Returns 0.5 when either class is absent.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> f64 {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut pairs: Vec<(f64, bool)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    // Average ranks over tied groups, 1-based
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum_pos += avg_rank * pairs[i..=j].iter().filter(|(_, l)| *l).count() as f64;
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let u = rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0;
    u / (n_pos * n_neg as f64)
}

/// Everything reported after a training run
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub legitimate: ClassMetrics,
    pub fraud: ClassMetrics,
    pub confusion: ConfusionMatrix,
    pub roc_auc: f64,
    /// Top features by `|weight|`
    pub top_features: Vec<(String, f64)>,
}

impl EvaluationReport {
    /// Evaluate fraud probabilities against held-out labels
    pub fn evaluate(
        probabilities: &[f64],
        labels: &[bool],
        threshold: f64,
        top_features: Vec<(String, f64)>,
    ) -> Self {
        let predicted: Vec<bool> = probabilities.iter().map(|&p| p >= threshold).collect();
        let confusion = ConfusionMatrix::from_predictions(&predicted, labels);

        Self {
            legitimate: confusion.negative_class(),
            fraud: confusion.positive_class(),
            confusion,
            roc_auc: roc_auc(probabilities, labels),
            top_features,
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Classification Report:")?;
        writeln!(f, "{:>12} {:>10} {:>10} {:>10} {:>10}", "", "precision", "recall", "f1-score", "support")?;
        for (name, m) in [("0", &self.legitimate), ("1", &self.fraud)] {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Confusion Matrix:")?;
        writeln!(f, "[[{} {}]", self.confusion.true_negatives, self.confusion.false_positives)?;
        writeln!(f, " [{} {}]]", self.confusion.false_negatives, self.confusion.true_positives)?;
        writeln!(f)?;
        writeln!(f, "ROC AUC Score: {:.4}", self.roc_auc)?;
        writeln!(f)?;
        writeln!(f, "Top {} Most Important Features:", self.top_features.len())?;
        for (name, importance) in &self.top_features {
            writeln!(f, "  {name:<10} {importance:.6}")?;
        }
        Ok(())
    }
}
