//! Low-rank adaptation for dense projections
//!
//! A LoRA adapter adds a trainable low-rank update to a frozen projection:
//! for a base weight W with shape [d_out, d_in], the adapted forward pass is
//! y = W x + (alpha / rank) * B (A x), where A is [rank, d_in] and B is
//! [d_out, rank]. A starts with small deterministic noise and B with zeros,
//! so the adapted output initially equals the base output.

use crate::layers::{Dense, DenseGrads};
use aprender::autograd::Tensor;

/// Trainable low-rank update matrices for one projection.
pub struct LoraAdapter {
    /// Down-projection A, shape [rank, d_in]
    lora_a: Tensor,
    /// Up-projection B, shape [d_out, rank]
    lora_b: Tensor,
    rank: usize,
    alpha: f32,
    scale: f32,
}

impl LoraAdapter {
    pub fn new(d_in: usize, d_out: usize, rank: usize, alpha: f32) -> Self {
        // Small deterministic init for A keeps runs reproducible without
        // threading an RNG through model construction.
        let a_data: Vec<f32> = (0..rank * d_in)
            .map(|i| (i as f32 * 0.7).sin() * 0.01)
            .collect();
        let lora_a = Tensor::new(&a_data, &[rank, d_in]);
        let lora_b = Tensor::zeros(&[d_out, rank]);

        Self {
            lora_a,
            lora_b,
            rank,
            alpha,
            scale: alpha / rank as f32,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }
}

/// Gradient buffers for one adapter, same shapes as A and B.
#[derive(Debug, Clone)]
pub struct AdapterGrads {
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

impl AdapterGrads {
    pub fn zeros(d_in: usize, d_out: usize, rank: usize) -> Self {
        Self {
            a: vec![0.0; rank * d_in],
            b: vec![0.0; d_out * rank],
        }
    }
}

/// A dense projection that can carry an optional LoRA adapter.
///
/// Without an adapter this behaves exactly like [`Dense`]. Once `attach_lora`
/// is called, the base weights are treated as frozen: they are still
/// serialized and still participate in the forward pass, but only the adapter
/// matrices receive optimizer updates.
pub struct AdaptedDense {
    base: Dense,
    d_in: usize,
    d_out: usize,
    adapter: Option<LoraAdapter>,
}

impl AdaptedDense {
    pub fn new(d_in: usize, d_out: usize) -> Self {
        Self {
            base: Dense::new(d_in, d_out),
            d_in,
            d_out,
            adapter: None,
        }
    }

    /// Attach a fresh LoRA adapter, replacing any existing one.
    pub fn attach_lora(&mut self, rank: usize, alpha: f32) {
        self.adapter = Some(LoraAdapter::new(self.d_in, self.d_out, rank, alpha));
    }

    pub fn has_lora(&self) -> bool {
        self.adapter.is_some()
    }

    pub fn lora_config(&self) -> Option<(usize, f32)> {
        self.adapter.as_ref().map(|a| (a.rank, a.alpha))
    }

    /// Forward over `rows` rows: base projection plus the scaled adapter path.
    pub fn forward(&self, x: &[f32], rows: usize) -> Vec<f32> {
        let mut y = self.base.forward(x, rows);

        let Some(adapter) = &self.adapter else {
            return y;
        };

        let a = adapter.lora_a.data();
        let b = adapter.lora_b.data();
        let rank = adapter.rank;
        let mut u = vec![0.0f32; rank];

        for r in 0..rows {
            let x_row = &x[r * self.d_in..(r + 1) * self.d_in];

            for (k, slot) in u.iter_mut().enumerate() {
                let a_row = &a[k * self.d_in..(k + 1) * self.d_in];
                *slot = a_row.iter().zip(x_row).map(|(a, x)| a * x).sum();
            }

            let y_row = &mut y[r * self.d_out..(r + 1) * self.d_out];
            for (o, slot) in y_row.iter_mut().enumerate() {
                let b_row = &b[o * rank..(o + 1) * rank];
                let delta: f32 = b_row.iter().zip(&u).map(|(b, u)| b * u).sum();
                *slot += adapter.scale * delta;
            }
        }

        y
    }

    /// Backward through both paths. Base gradients always accumulate (they are
    /// simply not handed to the optimizer when the adapter is attached), and
    /// the input gradient in `dx` includes the adapter contribution.
    pub fn backward(
        &self,
        x: &[f32],
        dy: &[f32],
        rows: usize,
        dx: &mut [f32],
        base_grads: &mut DenseGrads,
        adapter_grads: Option<&mut AdapterGrads>,
    ) {
        self.base.backward(x, dy, rows, dx, base_grads);

        let Some(adapter) = &self.adapter else {
            return;
        };
        let Some(grads) = adapter_grads else {
            return;
        };

        let a = adapter.lora_a.data();
        let b = adapter.lora_b.data();
        let rank = adapter.rank;
        let scale = adapter.scale;
        let mut u = vec![0.0f32; rank];
        let mut du = vec![0.0f32; rank];

        for r in 0..rows {
            let x_row = &x[r * self.d_in..(r + 1) * self.d_in];
            let dy_row = &dy[r * self.d_out..(r + 1) * self.d_out];
            let dx_row = &mut dx[r * self.d_in..(r + 1) * self.d_in];

            // Recompute the down-projection u = A x for this row.
            for (k, slot) in u.iter_mut().enumerate() {
                let a_row = &a[k * self.d_in..(k + 1) * self.d_in];
                *slot = a_row.iter().zip(x_row).map(|(a, x)| a * x).sum();
            }

            // dB[o,k] += scale * dy[o] * u[k];  du[k] = scale * sum_o B[o,k] dy[o]
            du.iter_mut().for_each(|v| *v = 0.0);
            for (o, &g) in dy_row.iter().enumerate() {
                if g == 0.0 {
                    continue;
                }
                let b_row = &b[o * rank..(o + 1) * rank];
                let gb_row = &mut grads.b[o * rank..(o + 1) * rank];
                for k in 0..rank {
                    gb_row[k] += scale * g * u[k];
                    du[k] += scale * b_row[k] * g;
                }
            }

            // dA[k,i] += du[k] * x[i];  dx[i] += sum_k A[k,i] du[k]
            for (k, &duk) in du.iter().enumerate() {
                if duk == 0.0 {
                    continue;
                }
                let a_row = &a[k * self.d_in..(k + 1) * self.d_in];
                let ga_row = &mut grads.a[k * self.d_in..(k + 1) * self.d_in];
                for i in 0..self.d_in {
                    ga_row[i] += duk * x_row[i];
                    dx_row[i] += a_row[i] * duk;
                }
            }
        }
    }

    /// All parameters, base first, for serialization.
    pub fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.base.parameters();
        if let Some(adapter) = &self.adapter {
            params.push(&adapter.lora_a);
            params.push(&adapter.lora_b);
        }
        params
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.base.parameters_mut();
        if let Some(adapter) = &mut self.adapter {
            params.push(&mut adapter.lora_a);
            params.push(&mut adapter.lora_b);
        }
        params
    }

    /// Parameters the optimizer should update: only the adapter matrices when
    /// LoRA is attached, otherwise the base projection weights.
    pub fn trainable_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        match &mut self.adapter {
            Some(adapter) => vec![&mut adapter.lora_a, &mut adapter.lora_b],
            None => self.base.parameters_mut(),
        }
    }
}
