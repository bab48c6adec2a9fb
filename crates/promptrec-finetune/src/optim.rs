//! Adam optimizer over explicit gradient buffers
//!
//! The model reports gradients as plain `f32` slices ordered like its
//! trainable parameter list, so the optimizer just zips the two. Moment
//! buffers are allocated lazily on the first step and keyed by position,
//! which assumes the same parameter list on every call.

use anyhow::Result;
use aprender::autograd::Tensor;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Adam with a fixed learning rate (no scheduler, no weight decay).
pub struct Adam {
    learning_rate: f32,
    step: usize,
    /// First and second moment estimates, one buffer per parameter
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            step: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Apply one bias-corrected update. `params` and `grads` must pair up
    /// one-to-one, in the same order on every call.
    pub fn step(&mut self, params: &mut [&mut Tensor], grads: &[&[f32]]) -> Result<()> {
        if params.len() != grads.len() {
            anyhow::bail!(
                "Optimizer got {} parameters but {} gradient buffers",
                params.len(),
                grads.len()
            );
        }

        if self.m.is_empty() {
            self.m = params.iter().map(|p| vec![0.0; p.data().len()]).collect();
            self.v = params.iter().map(|p| vec![0.0; p.data().len()]).collect();
        }
        if self.m.len() != params.len() {
            anyhow::bail!(
                "Optimizer state tracks {} parameters but step got {}",
                self.m.len(),
                params.len()
            );
        }

        self.step += 1;
        let bias1 = 1.0 - BETA1.powi(self.step as i32);
        let bias2 = 1.0 - BETA2.powi(self.step as i32);

        for (idx, (param, grad)) in params.iter_mut().zip(grads).enumerate() {
            let data = param.data();
            if data.len() != grad.len() {
                anyhow::bail!(
                    "Parameter {} has {} values but its gradient has {}",
                    idx,
                    data.len(),
                    grad.len()
                );
            }

            let m = &mut self.m[idx];
            let v = &mut self.v[idx];
            let mut updated = Vec::with_capacity(data.len());
            for i in 0..data.len() {
                let g = grad[i];
                m[i] = BETA1 * m[i] + (1.0 - BETA1) * g;
                v[i] = BETA2 * v[i] + (1.0 - BETA2) * g * g;
                let m_hat = m[i] / bias1;
                let v_hat = v[i] / bias2;
                updated.push(data[i] - self.learning_rate * m_hat / (v_hat.sqrt() + EPSILON));
            }

            let shape = param.shape().to_vec();
            **param = Tensor::new(&updated, &shape);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_moves_against_gradient() {
        let mut p = Tensor::new(&[1.0, -2.0], &[2]);
        let grad: &[f32] = &[0.5, -0.5];
        let mut optimizer = Adam::new(0.1);

        optimizer.step(&mut [&mut p], &[grad]).unwrap();

        // First step moves each value by ~lr opposite the gradient sign.
        assert!(p.data()[0] < 1.0);
        assert!(p.data()[1] > -2.0);
    }

    #[test]
    fn test_zero_gradient_leaves_parameter_fixed() {
        let mut p = Tensor::new(&[0.25, 0.75], &[2]);
        let grad: &[f32] = &[0.0, 0.0];
        let mut optimizer = Adam::new(0.1);

        optimizer.step(&mut [&mut p], &[grad]).unwrap();
        assert_eq!(p.data(), &[0.25, 0.75]);
    }

    #[test]
    fn test_mismatched_lengths_are_errors() {
        let mut p = Tensor::new(&[1.0], &[1]);
        let mut optimizer = Adam::new(0.1);

        assert!(optimizer.step(&mut [&mut p], &[]).is_err());

        let wrong: &[f32] = &[0.1, 0.2];
        assert!(optimizer.step(&mut [&mut p], &[wrong]).is_err());
    }

    #[test]
    fn test_repeated_steps_descend_a_quadratic() {
        // Minimize (x - 3)^2 with the analytic gradient 2(x - 3).
        let mut p = Tensor::new(&[0.0], &[1]);
        let mut optimizer = Adam::new(0.2);

        for _ in 0..200 {
            let g = [2.0 * (p.data()[0] - 3.0)];
            optimizer.step(&mut [&mut p], &[&g]).unwrap();
        }

        assert!((p.data()[0] - 3.0).abs() < 0.1, "got {}", p.data()[0]);
    }
}
