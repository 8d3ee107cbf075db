use crate::tensor::{RawTensor, Tensor};

/// Classification accuracy over (batch, classes) probabilities against
/// one-hot targets: fraction of rows whose argmax matches.
pub fn accuracy(pred: &Tensor, target: &Tensor) -> f32 {
    let pred_classes = RawTensor::argmax_rows(pred);
    let true_classes = RawTensor::argmax_rows(target);
    assert_eq!(
        pred_classes.len(),
        true_classes.len(),
        "accuracy requires matching batch sizes"
    );
    if pred_classes.is_empty() {
        return 0.0;
    }
    let correct = pred_classes
        .iter()
        .zip(&true_classes)
        .filter(|(a, b)| a == b)
        .count();
    correct as f32 / pred_classes.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_counts_argmax_matches() {
        let pred = RawTensor::new(
            vec![0.9, 0.1, 0.2, 0.8, 0.6, 0.4],
            &[3, 2],
            false,
        );
        let target = RawTensor::new(
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0],
            &[3, 2],
            false,
        );
        // rows 0 and 1 correct, row 2 wrong
        let acc = accuracy(&pred, &target);
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }
}
