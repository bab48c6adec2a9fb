//! Batching of preprocessed examples
//!
//! Shuffles preprocessed triples with a seeded RNG at each epoch and packs
//! them into `[batch, seq_len]` tensors. A trailing partial batch is padded
//! with zero-weight rows so it contributes nothing to the loss.

use aprender::autograd::Tensor;
use promptrec_model::Preprocessed;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub struct PromptBatcher {
    examples: Vec<Preprocessed>,
    batch_size: usize,
    seq_len: usize,
    order: Vec<usize>,
    cursor: usize,
    rng: StdRng,
}

impl PromptBatcher {
    pub fn new(examples: Vec<Preprocessed>, batch_size: usize, seq_len: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..examples.len()).collect();
        order.shuffle(&mut rng);

        Self {
            examples,
            batch_size,
            seq_len,
            order,
            cursor: 0,
            rng,
        }
    }

    /// Next batch as (inputs, targets, sample weights), each
    /// `[batch_size, seq_len]`. Returns None at epoch end.
    pub fn next_batch(&mut self) -> Option<(Tensor, Tensor, Tensor)> {
        if self.cursor >= self.order.len() {
            return None;
        }

        let elems = self.batch_size * self.seq_len;
        let mut inputs = vec![0.0f32; elems];
        let mut targets = vec![0.0f32; elems];
        let mut weights = vec![0.0f32; elems];

        for row in 0..self.batch_size {
            let Some(&idx) = self.order.get(self.cursor) else {
                break; // partial batch, remaining rows stay zero-weighted
            };
            self.cursor += 1;

            let example = &self.examples[idx];
            let offset = row * self.seq_len;
            inputs[offset..offset + self.seq_len].copy_from_slice(&example.inputs);
            targets[offset..offset + self.seq_len].copy_from_slice(&example.targets);
            weights[offset..offset + self.seq_len].copy_from_slice(&example.sample_weights);
        }

        let shape = [self.batch_size, self.seq_len];
        Some((
            Tensor::new(&inputs, &shape),
            Tensor::new(&targets, &shape),
            Tensor::new(&weights, &shape),
        ))
    }

    /// Start a new epoch: rewind and reshuffle.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.order.shuffle(&mut self.rng);
    }

    pub fn num_examples(&self) -> usize {
        self.examples.len()
    }

    pub fn batches_per_epoch(&self) -> usize {
        self.examples.len().div_ceil(self.batch_size)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }
}
