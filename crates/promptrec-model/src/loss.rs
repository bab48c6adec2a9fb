//! Token-prediction loss and accuracy
//!
//! Sparse categorical cross-entropy from logits, with optional per-position
//! sample weights so padding does not contribute to the loss, plus the
//! matching weighted token accuracy metric.

use anyhow::Result;
use aprender::autograd::Tensor;

/// Weighted sparse categorical cross-entropy over next-token predictions.
///
/// `logits` is `[batch, seq_len, vocab]`, `targets` is `[batch, seq_len]`
/// holding token IDs, `weights` (if given) is `[batch, seq_len]`. Returns the
/// scalar loss: sum(w * nll) / sum(w). An all-zero weight mask yields a zero
/// loss.
pub fn cross_entropy_loss(
    logits: &Tensor,
    targets: &Tensor,
    weights: Option<&Tensor>,
) -> Result<f32> {
    let shape = logits.shape();
    if shape.len() != 3 {
        anyhow::bail!("Expected [batch, seq_len, vocab] logits, got shape {:?}", shape);
    }
    let vocab = shape[2];
    let positions = shape[0] * shape[1];

    let logits_data = logits.data();
    let targets_data = targets.data();
    if targets_data.len() != positions {
        anyhow::bail!(
            "Targets have {} positions but logits have {}",
            targets_data.len(),
            positions
        );
    }

    let mut weighted_nll = 0.0f64;
    let mut weight_sum = 0.0f64;

    for pos in 0..positions {
        let weight = match weights {
            Some(w) => w.data()[pos],
            None => 1.0,
        };
        if weight == 0.0 {
            continue;
        }

        let target = targets_data[pos] as usize;
        if target >= vocab {
            anyhow::bail!("Target ID {} out of range for vocab size {}", target, vocab);
        }

        let row = &logits_data[pos * vocab..(pos + 1) * vocab];
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let log_sum_exp: f32 = row.iter().map(|&l| (l - max).exp()).sum::<f32>().ln() + max;
        let nll = log_sum_exp - row[target];

        weighted_nll += (weight * nll) as f64;
        weight_sum += weight as f64;
    }

    if weight_sum > 0.0 {
        Ok((weighted_nll / weight_sum) as f32)
    } else {
        Ok(0.0)
    }
}

/// Gradient of [`cross_entropy_loss`] with respect to the logits.
///
/// Returns a buffer with the logits' layout. For each weighted position the
/// row is `w * (softmax - onehot(target)) / sum(w)`; zero-weight positions
/// contribute nothing, and an all-zero mask yields an all-zero gradient.
pub fn cross_entropy_grad(
    logits: &Tensor,
    targets: &Tensor,
    weights: Option<&Tensor>,
) -> Result<Vec<f32>> {
    let shape = logits.shape();
    if shape.len() != 3 {
        anyhow::bail!("Expected [batch, seq_len, vocab] logits, got shape {:?}", shape);
    }
    let vocab = shape[2];
    let positions = shape[0] * shape[1];

    let logits_data = logits.data();
    let targets_data = targets.data();
    if targets_data.len() != positions {
        anyhow::bail!(
            "Targets have {} positions but logits have {}",
            targets_data.len(),
            positions
        );
    }

    let weight_sum: f32 = match weights {
        Some(w) => w.data().iter().sum(),
        None => positions as f32,
    };
    let mut grad = vec![0.0f32; logits_data.len()];
    if weight_sum == 0.0 {
        return Ok(grad);
    }

    for pos in 0..positions {
        let weight = match weights {
            Some(w) => w.data()[pos],
            None => 1.0,
        };
        if weight == 0.0 {
            continue;
        }

        let target = targets_data[pos] as usize;
        if target >= vocab {
            anyhow::bail!("Target ID {} out of range for vocab size {}", target, vocab);
        }

        let row = &logits_data[pos * vocab..(pos + 1) * vocab];
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let sum: f32 = row.iter().map(|&l| (l - max).exp()).sum();
        let scale = weight / weight_sum;

        let grad_row = &mut grad[pos * vocab..(pos + 1) * vocab];
        for (v, (&logit, slot)) in row.iter().zip(grad_row.iter_mut()).enumerate() {
            let softmax = (logit - max).exp() / sum;
            let indicator = if v == target { 1.0 } else { 0.0 };
            *slot = scale * (softmax - indicator);
        }
    }

    Ok(grad)
}

/// Weighted sparse categorical accuracy: the fraction of weighted positions
/// where the argmax of the logits equals the target ID.
pub fn token_accuracy(
    logits: &Tensor,
    targets: &Tensor,
    weights: Option<&Tensor>,
) -> Result<f32> {
    let shape = logits.shape();
    if shape.len() != 3 {
        anyhow::bail!("Expected [batch, seq_len, vocab] logits, got shape {:?}", shape);
    }
    let vocab = shape[2];
    let positions = shape[0] * shape[1];

    let logits_data = logits.data();
    let targets_data = targets.data();

    let mut correct = 0.0f64;
    let mut weight_sum = 0.0f64;

    for pos in 0..positions {
        let weight = match weights {
            Some(w) => w.data()[pos],
            None => 1.0,
        };
        if weight == 0.0 {
            continue;
        }

        let row = &logits_data[pos * vocab..(pos + 1) * vocab];
        let mut best = 0;
        let mut best_logit = f32::NEG_INFINITY;
        for (idx, &logit) in row.iter().enumerate() {
            if logit > best_logit {
                best_logit = logit;
                best = idx;
            }
        }

        if best == targets_data[pos] as usize {
            correct += weight as f64;
        }
        weight_sum += weight as f64;
    }

    if weight_sum > 0.0 {
        Ok((correct / weight_sum) as f32)
    } else {
        Ok(0.0)
    }
}
