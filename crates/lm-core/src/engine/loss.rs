//! Training criteria.

use crate::error::{MachineError, Result};

pub trait Criterion: Send {
    /// Mean loss over the batch and its gradient with respect to each
    /// output row.
    fn loss(&self, outputs: &[Vec<f32>], targets: &[usize]) -> Result<(f32, Vec<Vec<f32>>)>;
}

/// Softmax cross-entropy over raw class scores.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl Criterion for CrossEntropyLoss {
    fn loss(&self, outputs: &[Vec<f32>], targets: &[usize]) -> Result<(f32, Vec<Vec<f32>>)> {
        if outputs.len() != targets.len() {
            return Err(MachineError::Shape {
                message: format!("{} outputs but {} targets", outputs.len(), targets.len()),
            });
        }
        if outputs.is_empty() {
            return Err(MachineError::InvalidParams {
                message: "cannot compute loss of an empty batch".to_string(),
            });
        }

        let n = outputs.len() as f32;
        let mut total = 0.0;
        let mut grads = Vec::with_capacity(outputs.len());
        for (row, &target) in outputs.iter().zip(targets) {
            if target >= row.len() {
                return Err(MachineError::InvalidParams {
                    message: format!("label {} outside {} classes", target, row.len()),
                });
            }
            let probs = softmax(row);
            total -= probs[target].max(f32::MIN_POSITIVE).ln();

            let grad = probs
                .iter()
                .enumerate()
                .map(|(c, p)| if c == target { (p - 1.0) / n } else { p / n })
                .collect();
            grads.push(grad);
        }
        Ok((total / n, grads))
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_scores() {
        let (loss, grads) = CrossEntropyLoss.loss(&[vec![0.0; 4]], &[2]).unwrap();
        assert!((loss - 4.0f32.ln()).abs() < 1e-6);
        assert!((grads[0][2] + 0.75).abs() < 1e-6);
        assert!((grads[0][0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_averaged_over_batch() {
        let (_, grads) = CrossEntropyLoss
            .loss(&[vec![0.0, 0.0], vec![0.0, 0.0]], &[0, 1])
            .unwrap();
        assert!((grads[0][0] + 0.25).abs() < 1e-6);
        assert!((grads[1][0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_targets() {
        assert!(matches!(
            CrossEntropyLoss.loss(&[vec![0.0, 1.0]], &[2]),
            Err(MachineError::InvalidParams { .. })
        ));
        assert!(matches!(
            CrossEntropyLoss.loss(&[vec![0.0]], &[]),
            Err(MachineError::Shape { .. })
        ));
        assert!(CrossEntropyLoss.loss(&[], &[]).is_err());
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1000.0, 1001.0, 999.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[1] > probs[0]);
    }
}
