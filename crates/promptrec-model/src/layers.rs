//! Dense layer and normalization with explicit backward passes
//!
//! The backbone is trained by explicit chain-rule backpropagation: every
//! layer pairs its forward computation with a backward that accumulates
//! parameter gradients and the gradient with respect to its input. Parameters
//! live in `aprender` tensors so checkpoint serialization sees them;
//! gradients are plain `f32` buffers consumed by the optimizer.

use aprender::autograd::Tensor;

const RMS_EPS: f32 = 1e-6;

/// Gradient buffers for one dense layer, same shapes as its parameters.
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseGrads {
    pub fn zeros(d_in: usize, d_out: usize) -> Self {
        Self {
            weight: vec![0.0; d_out * d_in],
            bias: vec![0.0; d_out],
        }
    }
}

/// Fully connected layer: y = W x + b, with W stored `[d_out, d_in]`.
pub struct Dense {
    weight: Tensor,
    bias: Tensor,
    d_in: usize,
    d_out: usize,
}

impl Dense {
    pub fn new(d_in: usize, d_out: usize) -> Self {
        // Deterministic small init scaled by fan-in; preset weights overwrite
        // this on load.
        let scale = 0.08 / (d_in as f32).sqrt();
        let data: Vec<f32> = (0..d_out * d_in)
            .map(|i| (i as f32 * 0.93 + 0.17).sin() * scale)
            .collect();

        Self {
            weight: Tensor::new(&data, &[d_out, d_in]),
            bias: Tensor::zeros(&[d_out]),
            d_in,
            d_out,
        }
    }

    pub fn d_in(&self) -> usize {
        self.d_in
    }

    pub fn d_out(&self) -> usize {
        self.d_out
    }

    /// Forward over `rows` rows of `d_in` values each.
    pub fn forward(&self, x: &[f32], rows: usize) -> Vec<f32> {
        let w = self.weight.data();
        let b = self.bias.data();
        let mut y = vec![0.0f32; rows * self.d_out];

        for r in 0..rows {
            let x_row = &x[r * self.d_in..(r + 1) * self.d_in];
            let y_row = &mut y[r * self.d_out..(r + 1) * self.d_out];
            for (o, slot) in y_row.iter_mut().enumerate() {
                let w_row = &w[o * self.d_in..(o + 1) * self.d_in];
                let dot: f32 = w_row.iter().zip(x_row).map(|(w, x)| w * x).sum();
                *slot = dot + b[o];
            }
        }

        y
    }

    /// Backward: accumulates parameter gradients into `grads` and the input
    /// gradient into `dx` (callers zero `dx` beforehand if they want a fresh
    /// gradient).
    pub fn backward(
        &self,
        x: &[f32],
        dy: &[f32],
        rows: usize,
        dx: &mut [f32],
        grads: &mut DenseGrads,
    ) {
        let w = self.weight.data();

        for r in 0..rows {
            let x_row = &x[r * self.d_in..(r + 1) * self.d_in];
            let dy_row = &dy[r * self.d_out..(r + 1) * self.d_out];
            let dx_row = &mut dx[r * self.d_in..(r + 1) * self.d_in];

            for (o, &g) in dy_row.iter().enumerate() {
                if g == 0.0 {
                    continue;
                }
                grads.bias[o] += g;
                let w_row = &w[o * self.d_in..(o + 1) * self.d_in];
                let gw_row = &mut grads.weight[o * self.d_in..(o + 1) * self.d_in];
                for i in 0..self.d_in {
                    gw_row[i] += g * x_row[i];
                    dx_row[i] += w_row[i] * g;
                }
            }
        }
    }

    pub fn parameters(&self) -> Vec<&Tensor> {
        vec![&self.weight, &self.bias]
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        vec![&mut self.weight, &mut self.bias]
    }
}

/// RMS normalization over the last dimension.
pub fn rms_norm_forward(x: &[f32], dim: usize) -> Vec<f32> {
    let rows = x.len() / dim;
    let mut out = vec![0.0f32; x.len()];

    for row in 0..rows {
        let slice = &x[row * dim..(row + 1) * dim];
        let mean_sq: f32 = slice.iter().map(|v| v * v).sum::<f32>() / dim as f32;
        let inv = 1.0 / (mean_sq + RMS_EPS).sqrt();
        for (i, &v) in slice.iter().enumerate() {
            out[row * dim + i] = v * inv;
        }
    }

    out
}

/// Backward of [`rms_norm_forward`]: with s = (mean(x^2) + eps)^(-1/2),
/// dx_j = s * dy_j - x_j * s^3 * sum_i(dy_i * x_i) / dim.
pub fn rms_norm_backward(x: &[f32], dy: &[f32], dim: usize) -> Vec<f32> {
    let rows = x.len() / dim;
    let mut dx = vec![0.0f32; x.len()];

    for row in 0..rows {
        let xs = &x[row * dim..(row + 1) * dim];
        let dys = &dy[row * dim..(row + 1) * dim];
        let mean_sq: f32 = xs.iter().map(|v| v * v).sum::<f32>() / dim as f32;
        let s = 1.0 / (mean_sq + RMS_EPS).sqrt();
        let dot: f32 = dys.iter().zip(xs).map(|(d, v)| d * v).sum();
        let coeff = s * s * s * dot / dim as f32;

        let dxs = &mut dx[row * dim..(row + 1) * dim];
        for i in 0..dim {
            dxs[i] = s * dys[i] - xs[i] * coeff;
        }
    }

    dx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_forward_shape_and_bias() {
        let dense = Dense::new(3, 2);
        let y = dense.forward(&[0.0; 6], 2);
        // Zero input leaves only the (zero-initialized) bias.
        assert_eq!(y.len(), 4);
        assert!(y.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_dense_backward_matches_finite_difference() {
        let dense = Dense::new(4, 3);
        let x = [0.3, -0.7, 0.5, 0.1, -0.2, 0.9, 0.4, -0.6];
        let rows = 2;

        // Loss = sum of outputs, so dy is all ones and the input gradient is
        // the column sums of W.
        let dy = vec![1.0f32; rows * 3];
        let mut dx = vec![0.0f32; x.len()];
        let mut grads = DenseGrads::zeros(4, 3);
        dense.backward(&x, &dy, rows, &mut dx, &mut grads);

        let h = 1e-3;
        for i in 0..4 {
            let mut plus = x;
            plus[i] += h;
            let mut minus = x;
            minus[i] -= h;
            let f_plus: f32 = dense.forward(&plus, rows).iter().sum();
            let f_minus: f32 = dense.forward(&minus, rows).iter().sum();
            let numeric = (f_plus - f_minus) / (2.0 * h);
            assert!((dx[i] - numeric).abs() < 1e-2, "dx[{i}]: {} vs {}", dx[i], numeric);
        }
    }

    #[test]
    fn test_rms_norm_unit_rms() {
        let x = [3.0, -4.0, 12.0, 0.5];
        let out = rms_norm_forward(&x, 4);
        let rms: f32 = (out.iter().map(|v| v * v).sum::<f32>() / 4.0).sqrt();
        assert!((rms - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rms_norm_backward_matches_finite_difference() {
        let x = [0.8, -0.3, 0.6, -1.1];
        let dy = [0.2, -0.5, 0.7, 0.1];
        let dx = rms_norm_backward(&x, &dy, 4);

        let loss = |x: &[f32]| -> f32 {
            rms_norm_forward(x, 4).iter().zip(&dy).map(|(y, d)| y * d).sum()
        };
        let h = 1e-3;
        for i in 0..4 {
            let mut plus = x;
            plus[i] += h;
            let mut minus = x;
            minus[i] -= h;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * h);
            assert!((dx[i] - numeric).abs() < 1e-2, "dx[{i}]: {} vs {}", dx[i], numeric);
        }
    }
}
