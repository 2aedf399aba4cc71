// ============================================================
// Layer 5 — Label Harmonization
// ============================================================
// The models always predict three NLI classes
// [entailment, neutral, contradiction]. HANS has two:
// [entailment, non_entailment].
//
// hans_train (training only, on device, before the loss):
//   [e, n, c] → [e, n + c, ε]
//   Contradiction mass moves into neutral so the three-way
//   loss treats "non-entailment" as label 1. ε keeps log(p)
//   finite for the emptied slot.
//
// hans_validation (after the forward pass, on the host):
//   [e, n, c] → [e, n + c]
//   Predictions and true probabilities are read from the
//   two-way vector.

use burn::prelude::*;

/// Probability left in the emptied contradiction slot.
pub const HANS_CONTRADICTION_EPSILON: f64 = 1e-9;

/// Fold contradiction into neutral on the rows where
/// `hans_train_mask` is 1. Other rows pass through unchanged.
pub fn fold_hans_train<B: Backend>(prob: Tensor<B, 2>, hans_train_mask: Tensor<B, 1>) -> Tensor<B, 2> {
    let [n, _] = prob.dims();
    let mask = hans_train_mask.reshape([n, 1]);
    let keep = mask.clone().neg().add_scalar(1.0);

    let entailment    = prob.clone().slice([0..n, 0..1]);
    let neutral       = prob.clone().slice([0..n, 1..2]);
    let contradiction = prob.slice([0..n, 2..3]);

    let neutral       = neutral + contradiction.clone() * mask.clone();
    let contradiction = contradiction * keep + mask.mul_scalar(HANS_CONTRADICTION_EPSILON);

    Tensor::cat(vec![entailment, neutral, contradiction], 1)
}

/// Collapse a three-way probability vector to HANS's two classes.
pub fn collapse_to_two_way(prob: &[f32]) -> Vec<f32> {
    match prob {
        [e, n, c] => vec![*e, n + c],
        other => other.to_vec(),
    }
}

/// Index of the largest entry; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    #[test]
    fn test_fold_only_touches_hans_train_rows() {
        let device = Default::default();
        let prob = Tensor::<TB, 2>::from_floats([[0.2, 0.3, 0.5], [0.1, 0.6, 0.3]], &device);
        let mask = Tensor::<TB, 1>::from_floats([0.0, 1.0], &device);

        let out: Vec<f32> = fold_hans_train(prob, mask).into_data().convert::<f32>().to_vec().unwrap();

        assert_eq!(&out[..3], &[0.2, 0.3, 0.5]);
        assert!((out[3] - 0.1).abs() < 1e-6);
        assert!((out[4] - 0.9).abs() < 1e-6);
        assert!(out[5] > 0.0 && out[5] < 1e-6);
    }

    #[test]
    fn test_collapse_sums_to_at_most_one() {
        let two = collapse_to_two_way(&[0.25, 0.25, 0.5]);
        assert_eq!(two, vec![0.25, 0.75]);
        assert!(two.iter().sum::<f32>() <= 1.0);
    }

    #[test]
    fn test_argmax_ties_take_lowest_index() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.45, 0.45]), 1);
        assert_eq!(argmax(&[0.1, 0.2, 0.7]), 2);
    }
}
