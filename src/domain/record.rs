// ============================================================
// Layer 3 — Per-Example Records
// ============================================================
// Every step produces one BatchRecords: parallel columns with
// one entry per example in the batch. At epoch end the batches
// are concatenated column by column and turned into an
// EpochTable (one row per example) for offline analysis.
//
// Column         meaning
// idx            index of the example in its dataset file
// dataset        dataset code
// label          gold label id
// handcrafted    handcrafted type code
// heuristic      HANS heuristic code, -1 when absent
// loss           per-example loss
// pred           predicted label id (-1 when undecodable)
// true_pred      1.0 if the prediction is correct, else 0.0
// prob           per-class probability vector
// true_prob      probability assigned to the gold class

use serde::{Deserialize, Serialize};

use crate::domain::{dataset::DatasetId, error::MetricsError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRecords {
    pub idx:              Vec<i64>,
    pub dataset:          Vec<i64>,
    pub label:            Vec<i64>,
    pub handcrafted_type: Vec<i64>,
    pub heuristic:        Vec<i64>,
    pub loss:             Vec<f32>,
    pub pred:             Vec<i64>,
    pub true_pred:        Vec<f32>,
    pub prob:             Vec<Vec<f32>>,
    pub true_prob:        Vec<f32>,
}

impl BatchRecords {
    pub fn len(&self) -> usize {
        self.idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    /// Append another batch's columns to this one.
    pub fn extend(&mut self, other: BatchRecords) {
        self.idx.extend(other.idx);
        self.dataset.extend(other.dataset);
        self.label.extend(other.label);
        self.handcrafted_type.extend(other.handcrafted_type);
        self.heuristic.extend(other.heuristic);
        self.loss.extend(other.loss);
        self.pred.extend(other.pred);
        self.true_pred.extend(other.true_pred);
        self.prob.extend(other.prob);
        self.true_prob.extend(other.true_prob);
    }

    /// Concatenate a list of batches in order.
    pub fn concat(batches: impl IntoIterator<Item = BatchRecords>) -> BatchRecords {
        let mut all = BatchRecords::default();
        for b in batches {
            all.extend(b);
        }
        all
    }

    /// Keep only the rows whose dataset code matches.
    pub fn filter_dataset(&self, dataset: DatasetId) -> BatchRecords {
        let code = dataset.code();
        let keep: Vec<usize> = (0..self.len()).filter(|&i| self.dataset[i] == code).collect();
        self.select(&keep)
    }

    /// Rows at the given positions, in order.
    pub fn select(&self, rows: &[usize]) -> BatchRecords {
        BatchRecords {
            idx:              rows.iter().map(|&i| self.idx[i]).collect(),
            dataset:          rows.iter().map(|&i| self.dataset[i]).collect(),
            label:            rows.iter().map(|&i| self.label[i]).collect(),
            handcrafted_type: rows.iter().map(|&i| self.handcrafted_type[i]).collect(),
            heuristic:        rows.iter().map(|&i| self.heuristic[i]).collect(),
            loss:             rows.iter().map(|&i| self.loss[i]).collect(),
            pred:             rows.iter().map(|&i| self.pred[i]).collect(),
            true_pred:        rows.iter().map(|&i| self.true_pred[i]).collect(),
            prob:             rows.iter().map(|&i| self.prob[i].clone()).collect(),
            true_prob:        rows.iter().map(|&i| self.true_prob[i]).collect(),
        }
    }

    /// Verify every column has the same number of entries and return it.
    pub fn check_lengths(&self) -> Result<usize, MetricsError> {
        let n = self.idx.len();
        let columns: [(&'static str, usize); 9] = [
            ("dataset",          self.dataset.len()),
            ("label",            self.label.len()),
            ("handcrafted_type", self.handcrafted_type.len()),
            ("heuristic",        self.heuristic.len()),
            ("loss",             self.loss.len()),
            ("pred",             self.pred.len()),
            ("true_pred",        self.true_pred.len()),
            ("prob",             self.prob.len()),
            ("true_prob",        self.true_prob.len()),
        ];
        for (field, actual) in columns {
            if actual != n {
                return Err(MetricsError::LengthMismatch { field, expected: n, actual });
            }
        }
        Ok(n)
    }

    /// Mean per-example loss (NaN for an empty batch).
    pub fn mean_loss(&self) -> f64 {
        mean(self.loss.iter().map(|&l| l as f64), self.loss.len())
    }

    /// Mean of the correctness flags (NaN for an empty batch).
    pub fn accuracy(&self) -> f64 {
        mean(self.true_pred.iter().map(|&t| t as f64), self.true_pred.len())
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    values.sum::<f64>() / n as f64
}

// ─── EpochTable ───────────────────────────────────────────────────────────────
/// The per-example table of one epoch-end aggregation, already
/// rendered to strings so sinks can write it without knowing the
/// column types.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochTable {
    pub split:   String,
    pub dataset: DatasetId,
    pub epoch:   usize,
    pub step:    usize,
    pub header:  Vec<String>,
    pub rows:    Vec<Vec<String>>,
}

impl EpochTable {
    /// File name the table is exported under.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_epoch_end_df_epoch-{}_step-{}.csv",
            self.split, self.dataset, self.epoch, self.step
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rows() -> BatchRecords {
        BatchRecords {
            idx:              vec![0, 1],
            dataset:          vec![1, 7],
            label:            vec![0, 1],
            handcrafted_type: vec![0, 1],
            heuristic:        vec![-1, 2],
            loss:             vec![0.5, 1.5],
            pred:             vec![0, 0],
            true_pred:        vec![1.0, 0.0],
            prob:             vec![vec![0.6, 0.3, 0.1], vec![0.7, 0.3]],
            true_prob:        vec![0.6, 0.3],
        }
    }

    #[test]
    fn test_summary_scalars() {
        let r = two_rows();
        assert_eq!(r.check_lengths(), Ok(2));
        assert!((r.mean_loss() - 1.0).abs() < 1e-12);
        assert!((r.accuracy() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_detected() {
        let mut r = two_rows();
        r.loss.pop();
        assert_eq!(
            r.check_lengths(),
            Err(MetricsError::LengthMismatch { field: "loss", expected: 2, actual: 1 })
        );
    }

    #[test]
    fn test_concat_and_filter() {
        let all = BatchRecords::concat(vec![two_rows(), two_rows()]);
        assert_eq!(all.len(), 4);
        let hans = all.filter_dataset(DatasetId::HansValidation);
        assert_eq!(hans.idx, vec![1, 1]);
        assert!(hans.dataset.iter().all(|&d| d == DatasetId::HansValidation.code()));
    }

    #[test]
    fn test_table_file_name() {
        let t = EpochTable {
            split:   "Valid".into(),
            dataset: DatasetId::HansValidation,
            epoch:   2,
            step:    300,
            header:  vec![],
            rows:    vec![],
        };
        assert_eq!(t.file_name(), "Valid_hans_validation_epoch_end_df_epoch-2_step-300.csv");
    }
}
