// ============================================================
// Layer 5 — Epoch Aggregation
// ============================================================
// Turns the concatenated per-example records of one dataset
// into named scalars plus a per-example table.
//
// Always:
//   {split}/{dataset}/loss_epoch
//   {split}/{dataset}/acc_epoch
//   {split}/{dataset}/datapoint_count_epoch
//
// MNLI / SNLI, per handcrafted type present:
//   {split}/HandcraftedType/{dataset}_{type}_loss
//   {split}/HandcraftedType/{dataset}_{type}_accuracy
//
// HANS, per (label, heuristic) present:
//   {split}/Hans_loss/{label}__{heuristic}
//   {split}/Hans_acc/{label}__{heuristic}
//
// Groups with no examples are skipped rather than logged as NaN.

use crate::domain::{
    dataset::DatasetId,
    error::MetricsError,
    handcrafted::{handcrafted_code_title, HandcraftedType},
    heuristic::{heuristic_code_name, Heuristic},
    label::HANS_LABEL_NAMES,
    record::{BatchRecords, EpochTable},
};

/// Column order of the exported per-example table. The leading
/// unnamed column is the row index.
pub const TABLE_COLUMNS: [&str; 14] = [
    "datapoint_idx",
    "datapoint_dataset",
    "datapoint_label",
    "datapoint_handcrafted_type",
    "datapoint_heuristic",
    "datapoint_loss",
    "datapoint_pred",
    "datapoint_true_pred",
    "datapoint_prob",
    "datapoint_true_prob",
    "epoch",
    "step",
    "datapoint_heuristics_str",
    "datapoint_handcrafted_type_str",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochSummary {
    pub loss:  f64,
    pub acc:   f64,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct EpochReport {
    pub dataset: DatasetId,
    pub summary: EpochSummary,
    pub scalars: Vec<(String, f64)>,
    pub table:   EpochTable,
}

/// Mean loss, accuracy and count, after checking that every
/// column has the same length and that the correctness flags
/// agree with the predictions.
pub fn summarize(records: &BatchRecords) -> Result<EpochSummary, MetricsError> {
    let count = records.check_lengths()?;
    if count == 0 {
        return Err(MetricsError::Empty);
    }

    let from_flags = records.accuracy();
    let from_preds = prediction_accuracy(records);
    if from_flags != from_preds {
        return Err(MetricsError::AccuracyMismatch { from_flags, from_preds });
    }

    Ok(EpochSummary { loss: records.mean_loss(), acc: from_flags, count })
}

fn prediction_accuracy(records: &BatchRecords) -> f64 {
    let hits = records.pred.iter().zip(&records.label).filter(|(p, l)| p == l).count();
    hits as f64 / records.pred.len() as f64
}

/// Full epoch-end aggregation for one dataset.
pub fn epoch_end(
    split:   &str,
    dataset: DatasetId,
    epoch:   usize,
    step:    usize,
    records: &BatchRecords,
) -> Result<EpochReport, MetricsError> {
    let summary = summarize(records)?;

    let mut scalars = vec![
        (format!("{split}/{dataset}/loss_epoch"), summary.loss),
        (format!("{split}/{dataset}/acc_epoch"), summary.acc),
        (format!("{split}/{dataset}/datapoint_count_epoch"), summary.count as f64),
    ];
    if dataset.is_three_way_corpus() {
        scalars.extend(handcrafted_breakdown(split, dataset, records));
    }
    if dataset.is_hans() {
        scalars.extend(hans_breakdown(split, records));
    }

    Ok(EpochReport {
        dataset,
        summary,
        scalars,
        table: epoch_table(split, dataset, epoch, step, records),
    })
}

/// Loss and accuracy per handcrafted type.
pub fn handcrafted_breakdown(split: &str, dataset: DatasetId, records: &BatchRecords) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for kind in HandcraftedType::ALL {
        let rows: Vec<usize> = (0..records.len())
            .filter(|&i| records.handcrafted_type[i] == kind.code())
            .collect();
        if rows.is_empty() {
            continue;
        }
        let group = records.select(&rows);
        let name  = kind.metric_name();
        out.push((format!("{split}/HandcraftedType/{dataset}_{name}_loss"), group.mean_loss()));
        out.push((format!("{split}/HandcraftedType/{dataset}_{name}_accuracy"), group.accuracy()));
    }
    out
}

/// Loss and accuracy per (two-way label, heuristic) pair.
pub fn hans_breakdown(split: &str, records: &BatchRecords) -> Vec<(String, f64)> {
    let mut out = Vec::new();
    for (label, label_name) in HANS_LABEL_NAMES.iter().enumerate() {
        for heuristic in Heuristic::ALL {
            let rows: Vec<usize> = (0..records.len())
                .filter(|&i| records.label[i] == label as i64 && records.heuristic[i] == heuristic.code())
                .collect();
            if rows.is_empty() {
                continue;
            }
            let group = records.select(&rows);
            let key   = format!("{label_name}__{}", heuristic.name());
            out.push((format!("{split}/Hans_loss/{key}"), group.mean_loss()));
            out.push((format!("{split}/Hans_acc/{key}"), prediction_accuracy(&group)));
        }
    }
    out
}

/// Step-level scalars, logged for MNLI and SNLI batches only.
pub fn step_scalars(prefix: &str, dataset: DatasetId, records: &BatchRecords) -> Vec<(String, f64)> {
    if !dataset.is_three_way_corpus() || records.is_empty() {
        return Vec::new();
    }
    vec![
        (format!("{prefix}/{dataset}/loss_step"), records.mean_loss()),
        (format!("{prefix}/{dataset}/acc_step"), records.accuracy()),
        (format!("{prefix}/{dataset}/datapoint_count_step"), records.len() as f64),
    ]
}

/// Render the per-example table; probability vectors become
/// space-separated strings like `[0.1 0.2 0.7]`.
pub fn epoch_table(split: &str, dataset: DatasetId, epoch: usize, step: usize, records: &BatchRecords) -> EpochTable {
    let mut header = vec![String::new()];
    header.extend(TABLE_COLUMNS.iter().map(|c| c.to_string()));

    let rows = (0..records.len())
        .map(|i| {
            vec![
                i.to_string(),
                records.idx[i].to_string(),
                records.dataset[i].to_string(),
                records.label[i].to_string(),
                records.handcrafted_type[i].to_string(),
                records.heuristic[i].to_string(),
                records.loss[i].to_string(),
                records.pred[i].to_string(),
                records.true_pred[i].to_string(),
                format_vector(&records.prob[i]),
                records.true_prob[i].to_string(),
                epoch.to_string(),
                step.to_string(),
                heuristic_code_name(records.heuristic[i]).to_string(),
                handcrafted_code_title(records.handcrafted_type[i]),
            ]
        })
        .collect();

    EpochTable { split: split.to_string(), dataset, epoch, step, header, rows }
}

fn format_vector(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(" "))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(records: &mut BatchRecords, dataset: DatasetId, label: i64, pred: i64, handcrafted: i64, heuristic: i64, loss: f32) {
        records.idx.push(records.idx.len() as i64);
        records.dataset.push(dataset.code());
        records.label.push(label);
        records.handcrafted_type.push(handcrafted);
        records.heuristic.push(heuristic);
        records.loss.push(loss);
        records.pred.push(pred);
        records.true_pred.push(if pred == label { 1.0 } else { 0.0 });
        records.prob.push(vec![0.5, 0.5]);
        records.true_prob.push(0.5);
    }

    fn hans() -> BatchRecords {
        let mut r = BatchRecords::default();
        row(&mut r, DatasetId::HansValidation, 0, 0, 1, 0, 0.25);
        row(&mut r, DatasetId::HansValidation, 0, 1, 1, 0, 0.75);
        row(&mut r, DatasetId::HansValidation, 1, 1, 2, 2, 1.0);
        r
    }

    fn find(scalars: &[(String, f64)], name: &str) -> Option<f64> {
        scalars.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    #[test]
    fn test_summary_and_epoch_scalars() {
        let report = epoch_end("Valid", DatasetId::HansValidation, 1, 30, &hans()).unwrap();
        assert_eq!(report.summary.count, 3);
        assert!((report.summary.acc - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(find(&report.scalars, "Valid/hans_validation/datapoint_count_epoch"), Some(3.0));
        assert!((find(&report.scalars, "Valid/hans_validation/loss_epoch").unwrap() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_hans_breakdown_skips_empty_groups() {
        let scalars = hans_breakdown("Valid", &hans());
        // Two non-empty (label, heuristic) groups, two scalars each
        assert_eq!(scalars.len(), 4);
        assert_eq!(find(&scalars, "Valid/Hans_acc/entailment__lexical_overlap"), Some(0.5));
        assert_eq!(find(&scalars, "Valid/Hans_loss/entailment__lexical_overlap"), Some(0.5));
        assert_eq!(find(&scalars, "Valid/Hans_acc/non_entailment__constituent"), Some(1.0));
        assert!(scalars.iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn test_handcrafted_breakdown_for_three_way_corpora() {
        let mut r = BatchRecords::default();
        row(&mut r, DatasetId::MnliValidationMatched, 2, 2, 0, -1, 0.5);
        row(&mut r, DatasetId::MnliValidationMatched, 1, 0, 2, -1, 1.5);

        let report = epoch_end("Valid", DatasetId::MnliValidationMatched, 0, 10, &r).unwrap();
        assert_eq!(find(&report.scalars, "Valid/HandcraftedType/mnli_validation_matched_regular_accuracy"), Some(1.0));
        assert_eq!(find(&report.scalars, "Valid/HandcraftedType/mnli_validation_matched_subsequence_loss"), Some(1.5));
        assert!(find(&report.scalars, "Valid/HandcraftedType/mnli_validation_matched_constituent_loss").is_none());
        assert!(!report.scalars.iter().any(|(n, _)| n.contains("Hans_")));
    }

    #[test]
    fn test_accuracy_mismatch_is_detected() {
        let mut r = hans();
        r.true_pred[1] = 1.0;
        assert!(matches!(summarize(&r), Err(MetricsError::AccuracyMismatch { .. })));
    }

    #[test]
    fn test_empty_and_ragged_records_are_errors() {
        assert_eq!(summarize(&BatchRecords::default()), Err(MetricsError::Empty));
        let mut r = hans();
        r.prob.pop();
        assert!(matches!(summarize(&r), Err(MetricsError::LengthMismatch { field: "prob", .. })));
    }

    #[test]
    fn test_step_scalars_only_for_mnli_and_snli() {
        assert!(step_scalars("Train", DatasetId::HansTrain, &hans()).is_empty());

        let mut r = BatchRecords::default();
        row(&mut r, DatasetId::SnliTrain, 0, 0, 0, -1, 1.0);
        let scalars = step_scalars("Train", DatasetId::SnliTrain, &r);
        assert_eq!(find(&scalars, "Train/snli_train/acc_step"), Some(1.0));
        assert_eq!(find(&scalars, "Train/snli_train/datapoint_count_step"), Some(1.0));
    }

    #[test]
    fn test_table_rendering() {
        let table = epoch_table("Valid", DatasetId::HansValidation, 1, 30, &hans());
        assert_eq!(table.header.len(), TABLE_COLUMNS.len() + 1);
        assert_eq!(table.header[0], "");
        assert_eq!(table.rows.len(), 3);

        let first = &table.rows[0];
        assert_eq!(first[0], "0");
        assert_eq!(first[9], "[0.5 0.5]");
        assert_eq!(first[13], "lexical_overlap");
        assert_eq!(first[14], "Lexical_Overlap");
        assert_eq!(table.rows[2][13], "constituent");
        assert_eq!(table.rows[2][14], "Subsequence");
    }
}
