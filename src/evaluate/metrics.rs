//! Binary classification metrics

use std::fmt;

const EPS: f64 = 1e-15;

/// Scores for a set of probabilistic predictions of `target == 1`
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Number of predictions scored
    pub count: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Undefined when the labels contain a single class
    pub roc_auc: Option<f64>,
    pub log_loss: f64,
}

impl Metrics {
    /// Score probabilities against 0/1 labels; a probability of 0.5 or more
    /// counts as predicting 1.
    ///
    /// Both slices must have the same length.
    pub fn from_predictions(probs: &[f64], labels: &[u8]) -> Self {
        debug_assert_eq!(probs.len(), labels.len());

        let count = probs.len().min(labels.len());
        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        let mut loss_sum = 0.0;

        for (&p, &y) in probs.iter().zip(labels) {
            let predicted = p >= 0.5;
            match (predicted, y == 1) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }

            let p = p.clamp(EPS, 1.0 - EPS);
            loss_sum -= if y == 1 { p.ln() } else { (1.0 - p).ln() };
        }

        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Metrics {
            count,
            accuracy: ratio(tp + tn, count),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(&probs[..count], &labels[..count]),
            log_loss: if count == 0 { 0.0 } else { loss_sum / count as f64 },
        }
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties share the
/// average rank
pub fn roc_auc(probs: &[f64], labels: &[u8]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&y| y == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[a].total_cmp(&probs[b]));

    let mut pos_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && probs[order[j + 1]] == probs[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                pos_rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let auc = match self.roc_auc {
            Some(v) => format!("{:.4}", v),
            None => "n/a".to_string(),
        };
        write!(
            f,
            "Acc: {:.2}% | Prec: {:.4} | Rec: {:.4} | F1: {:.4} | AUC: {} | LogLoss: {:.4} (n={})",
            self.accuracy * 100.0,
            self.precision,
            self.recall,
            self.f1,
            auc,
            self.log_loss,
            self.count
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_predictions() {
        let probs = [0.9, 0.8, 0.3, 0.2];
        let labels = [1, 0, 1, 0];
        let m = Metrics::from_predictions(&probs, &labels);

        assert_eq!(m.count, 4);
        assert!((m.accuracy - 0.5).abs() < 1e-12);
        assert!((m.precision - 0.5).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert!((m.f1 - 0.5).abs() < 1e-12);
        assert!((m.roc_auc.unwrap() - 0.75).abs() < 1e-12);

        let expected_loss = -((0.9f64).ln() + (0.2f64).ln() + (0.3f64).ln() + (0.8f64).ln()) / 4.0;
        assert!((m.log_loss - expected_loss).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_and_inverted() {
        let labels = [1, 1, 0, 0];
        let perfect = Metrics::from_predictions(&[1.0, 0.7, 0.2, 0.0], &labels);
        assert_eq!(perfect.accuracy, 1.0);
        assert_eq!(perfect.roc_auc, Some(1.0));
        // Clipping keeps the loss finite at hard 0/1 probabilities
        assert!(perfect.log_loss.is_finite());

        let inverted = Metrics::from_predictions(&[0.0, 0.1, 0.9, 1.0], &labels);
        assert_eq!(inverted.accuracy, 0.0);
        assert_eq!(inverted.roc_auc, Some(0.0));
        assert_eq!(inverted.precision, 0.0);
        assert_eq!(inverted.f1, 0.0);
        assert!(inverted.log_loss.is_finite());
        assert!(inverted.log_loss > 10.0);
    }

    #[test]
    fn test_auc_ties_average() {
        assert_eq!(roc_auc(&[0.5, 0.5, 0.5, 0.5], &[1, 0, 1, 0]), Some(0.5));
        // One tied pair counts half
        let auc = roc_auc(&[0.6, 0.6, 0.1], &[1, 0, 0]).unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_and_empty() {
        let m = Metrics::from_predictions(&[0.7, 0.6], &[1, 1]);
        assert_eq!(m.roc_auc, None);
        assert_eq!(m.recall, 1.0);
        assert!(m.to_string().contains("AUC: n/a"));

        let empty = Metrics::from_predictions(&[], &[]);
        assert_eq!(empty.count, 0);
        assert_eq!(empty.accuracy, 0.0);
        assert_eq!(empty.log_loss, 0.0);
    }
}
