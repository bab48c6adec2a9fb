//! Decoder-only causal LM backbone
//!
//! A compact pre-norm transformer: learned token and position embeddings,
//! causal self-attention, ReLU MLPs, and a dense LM head. Attention query and
//! value projections carry optional LoRA adapters; everything else is a plain
//! dense layer.
//!
//! Training uses explicit chain-rule backpropagation: `forward_with_cache`
//! records every intermediate activation, `backward` walks them in reverse
//! and fills a [`Gradients`] bundle whose slices line up one-to-one with
//! `trainable_parameters_mut`.

use crate::config::ModelConfig;
use crate::layers::{rms_norm_backward, rms_norm_forward, Dense, DenseGrads};
use crate::lora::{AdaptedDense, AdapterGrads};
use anyhow::Result;
use aprender::autograd::Tensor;
use aprender::nn::Module;

/// Activations recorded by one attention forward pass.
pub struct AttentionCache {
    /// Query/key/value projections, each `[rows, n_embd]`
    q: Vec<f32>,
    k: Vec<f32>,
    v: Vec<f32>,
    /// Softmax attention weights, `[batch, n_head, seq, seq]` (zero above the
    /// diagonal)
    weights: Vec<f32>,
    /// Per-head outputs concatenated, `[rows, n_embd]`, before out_proj
    concat: Vec<f32>,
}

/// Gradient buffers for one attention layer.
pub struct AttentionGrads {
    pub q: DenseGrads,
    pub q_adapter: Option<AdapterGrads>,
    pub k: DenseGrads,
    pub v: DenseGrads,
    pub v_adapter: Option<AdapterGrads>,
    pub out: DenseGrads,
}

/// Multi-head causal self-attention.
///
/// Query and value projections are `AdaptedDense` so LoRA can be injected
/// into them; key and output projections stay plain dense layers, matching
/// the usual low-rank adaptation targets for attention.
pub struct CausalSelfAttention {
    q_proj: AdaptedDense,
    k_proj: Dense,
    v_proj: AdaptedDense,
    out_proj: Dense,
    n_head: usize,
    head_dim: usize,
    n_embd: usize,
}

impl CausalSelfAttention {
    pub fn new(n_embd: usize, n_head: usize) -> Self {
        Self {
            q_proj: AdaptedDense::new(n_embd, n_embd),
            k_proj: Dense::new(n_embd, n_embd),
            v_proj: AdaptedDense::new(n_embd, n_embd),
            out_proj: Dense::new(n_embd, n_embd),
            n_head,
            head_dim: n_embd / n_head,
            n_embd,
        }
    }

    fn index(&self, seq_len: usize, b: usize, s: usize, h: usize, d: usize) -> usize {
        b * seq_len * self.n_embd + s * self.n_embd + h * self.head_dim + d
    }

    fn weight_index(&self, seq_len: usize, b: usize, h: usize, i: usize, j: usize) -> usize {
        ((b * self.n_head + h) * seq_len + i) * seq_len + j
    }

    /// Forward pass over `[batch, seq_len, n_embd]` rows, returning the
    /// output and the activations the backward pass needs.
    pub fn forward(&self, x: &[f32], batch: usize, seq_len: usize) -> (Vec<f32>, AttentionCache) {
        let rows = batch * seq_len;
        let q = self.q_proj.forward(x, rows);
        let k = self.k_proj.forward(x, rows);
        let v = self.v_proj.forward(x, rows);

        let scale = 1.0 / (self.head_dim as f32).sqrt();
        let mut weights = vec![0.0f32; batch * self.n_head * seq_len * seq_len];
        let mut concat = vec![0.0f32; rows * self.n_embd];
        let mut scores = vec![0.0f32; seq_len];

        for b in 0..batch {
            for h in 0..self.n_head {
                for i in 0..seq_len {
                    // Scores against all non-future positions.
                    for (j, slot) in scores.iter_mut().enumerate().take(i + 1) {
                        let mut dot = 0.0;
                        for d in 0..self.head_dim {
                            dot += q[self.index(seq_len, b, i, h, d)]
                                * k[self.index(seq_len, b, j, h, d)];
                        }
                        *slot = dot * scale;
                    }

                    // Softmax over positions 0..=i.
                    let max = scores[..=i].iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                    let mut sum = 0.0;
                    for slot in scores[..=i].iter_mut() {
                        *slot = (*slot - max).exp();
                        sum += *slot;
                    }
                    for (j, &s) in scores[..=i].iter().enumerate() {
                        weights[self.weight_index(seq_len, b, h, i, j)] = s / sum;
                    }

                    for d in 0..self.head_dim {
                        let mut acc = 0.0;
                        for j in 0..=i {
                            acc += weights[self.weight_index(seq_len, b, h, i, j)]
                                * v[self.index(seq_len, b, j, h, d)];
                        }
                        concat[self.index(seq_len, b, i, h, d)] = acc;
                    }
                }
            }
        }

        let out = self.out_proj.forward(&concat, rows);
        (
            out,
            AttentionCache {
                q,
                k,
                v,
                weights,
                concat,
            },
        )
    }

    /// Backward pass. `x` is the same normalized input the forward saw; the
    /// input gradient accumulates into `dx`.
    pub fn backward(
        &self,
        x: &[f32],
        cache: &AttentionCache,
        dy: &[f32],
        batch: usize,
        seq_len: usize,
        dx: &mut [f32],
        grads: &mut AttentionGrads,
    ) {
        let rows = batch * seq_len;
        let scale = 1.0 / (self.head_dim as f32).sqrt();

        let mut dconcat = vec![0.0f32; rows * self.n_embd];
        self.out_proj
            .backward(&cache.concat, dy, rows, &mut dconcat, &mut grads.out);

        let mut dq = vec![0.0f32; rows * self.n_embd];
        let mut dk = vec![0.0f32; rows * self.n_embd];
        let mut dv = vec![0.0f32; rows * self.n_embd];
        let mut dweights = vec![0.0f32; seq_len];

        for b in 0..batch {
            for h in 0..self.n_head {
                for i in 0..seq_len {
                    // Gradient of the weighted value sum w.r.t. each softmax
                    // weight, and of the values themselves.
                    for (j, slot) in dweights.iter_mut().enumerate().take(i + 1) {
                        let mut dot = 0.0;
                        for d in 0..self.head_dim {
                            dot += dconcat[self.index(seq_len, b, i, h, d)]
                                * cache.v[self.index(seq_len, b, j, h, d)];
                        }
                        *slot = dot;
                    }
                    for j in 0..=i {
                        let w = cache.weights[self.weight_index(seq_len, b, h, i, j)];
                        for d in 0..self.head_dim {
                            dv[self.index(seq_len, b, j, h, d)] +=
                                w * dconcat[self.index(seq_len, b, i, h, d)];
                        }
                    }

                    // Softmax jacobian: ds_j = w_j * (dw_j - sum_k w_k dw_k).
                    let mut weighted_sum = 0.0;
                    for j in 0..=i {
                        weighted_sum += cache.weights[self.weight_index(seq_len, b, h, i, j)]
                            * dweights[j];
                    }
                    for j in 0..=i {
                        let w = cache.weights[self.weight_index(seq_len, b, h, i, j)];
                        let ds = w * (dweights[j] - weighted_sum) * scale;
                        if ds == 0.0 {
                            continue;
                        }
                        for d in 0..self.head_dim {
                            dq[self.index(seq_len, b, i, h, d)] +=
                                ds * cache.k[self.index(seq_len, b, j, h, d)];
                            dk[self.index(seq_len, b, j, h, d)] +=
                                ds * cache.q[self.index(seq_len, b, i, h, d)];
                        }
                    }
                }
            }
        }

        self.q_proj
            .backward(x, &dq, rows, dx, &mut grads.q, grads.q_adapter.as_mut());
        self.k_proj.backward(x, &dk, rows, dx, &mut grads.k);
        self.v_proj
            .backward(x, &dv, rows, dx, &mut grads.v, grads.v_adapter.as_mut());
    }

    /// Attach LoRA adapters to the query and value projections.
    pub fn attach_lora(&mut self, rank: usize, alpha: f32) {
        self.q_proj.attach_lora(rank, alpha);
        self.v_proj.attach_lora(rank, alpha);
    }

    pub fn has_lora(&self) -> bool {
        self.q_proj.has_lora()
    }

    fn grads(&self) -> AttentionGrads {
        let adapter = |proj: &AdaptedDense| {
            proj.lora_config()
                .map(|(rank, _)| AdapterGrads::zeros(self.n_embd, self.n_embd, rank))
        };
        AttentionGrads {
            q: DenseGrads::zeros(self.n_embd, self.n_embd),
            q_adapter: adapter(&self.q_proj),
            k: DenseGrads::zeros(self.n_embd, self.n_embd),
            v: DenseGrads::zeros(self.n_embd, self.n_embd),
            v_adapter: adapter(&self.v_proj),
            out: DenseGrads::zeros(self.n_embd, self.n_embd),
        }
    }

    fn trainable_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = self.q_proj.trainable_parameters_mut();
        params.extend(self.v_proj.trainable_parameters_mut());
        params
    }
}

/// Activations recorded by one block forward pass.
pub struct BlockCache {
    /// Block input, `[rows, n_embd]`
    x: Vec<f32>,
    x_norm1: Vec<f32>,
    attn: AttentionCache,
    /// After the attention residual
    x1: Vec<f32>,
    x_norm2: Vec<f32>,
    /// MLP hidden pre-activation, `[rows, 4 * n_embd]`
    h_pre: Vec<f32>,
    h_relu: Vec<f32>,
}

/// Gradient buffers for one block.
pub struct BlockGrads {
    pub attn: AttentionGrads,
    pub fc1: DenseGrads,
    pub fc2: DenseGrads,
}

/// Pre-norm transformer block: x = x + attn(norm(x)); x = x + mlp(norm(x)).
pub struct Block {
    attn: CausalSelfAttention,
    fc1: Dense,
    fc2: Dense,
    n_embd: usize,
}

impl Block {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            attn: CausalSelfAttention::new(config.n_embd, config.n_head),
            fc1: Dense::new(config.n_embd, 4 * config.n_embd),
            fc2: Dense::new(4 * config.n_embd, config.n_embd),
            n_embd: config.n_embd,
        }
    }

    pub fn forward(&self, x: Vec<f32>, batch: usize, seq_len: usize) -> (Vec<f32>, BlockCache) {
        let rows = batch * seq_len;
        let x_norm1 = rms_norm_forward(&x, self.n_embd);
        let (attn_out, attn_cache) = self.attn.forward(&x_norm1, batch, seq_len);

        let mut x1 = x.clone();
        for (a, b) in x1.iter_mut().zip(&attn_out) {
            *a += b;
        }

        let x_norm2 = rms_norm_forward(&x1, self.n_embd);
        let h_pre = self.fc1.forward(&x_norm2, rows);
        let h_relu: Vec<f32> = h_pre.iter().map(|&v| v.max(0.0)).collect();
        let mlp_out = self.fc2.forward(&h_relu, rows);

        let mut y = x1.clone();
        for (a, b) in y.iter_mut().zip(&mlp_out) {
            *a += b;
        }

        (
            y,
            BlockCache {
                x,
                x_norm1,
                attn: attn_cache,
                x1,
                x_norm2,
                h_pre,
                h_relu,
            },
        )
    }

    /// Backward pass: output gradient in, input gradient out.
    pub fn backward(
        &self,
        cache: &BlockCache,
        dy: &[f32],
        batch: usize,
        seq_len: usize,
        grads: &mut BlockGrads,
    ) -> Vec<f32> {
        let rows = batch * seq_len;

        // MLP branch. The residual carries dy straight into dx1.
        let mut dh_relu = vec![0.0f32; rows * 4 * self.n_embd];
        self.fc2
            .backward(&cache.h_relu, dy, rows, &mut dh_relu, &mut grads.fc2);
        let dh_pre: Vec<f32> = dh_relu
            .iter()
            .zip(&cache.h_pre)
            .map(|(&g, &h)| if h > 0.0 { g } else { 0.0 })
            .collect();
        let mut dx_norm2 = vec![0.0f32; rows * self.n_embd];
        self.fc1
            .backward(&cache.x_norm2, &dh_pre, rows, &mut dx_norm2, &mut grads.fc1);

        let mut dx1 = dy.to_vec();
        for (a, b) in dx1
            .iter_mut()
            .zip(rms_norm_backward(&cache.x1, &dx_norm2, self.n_embd))
        {
            *a += b;
        }

        // Attention branch, then the outer residual back into the block input.
        let mut dx_norm1 = vec![0.0f32; rows * self.n_embd];
        self.attn.backward(
            &cache.x_norm1,
            &cache.attn,
            &dx1,
            batch,
            seq_len,
            &mut dx_norm1,
            &mut grads.attn,
        );

        let mut dx = dx1;
        for (a, b) in dx
            .iter_mut()
            .zip(rms_norm_backward(&cache.x, &dx_norm1, self.n_embd))
        {
            *a += b;
        }

        dx
    }
}

/// Every activation `backward` needs, recorded during `forward_with_cache`.
pub struct ForwardCache {
    batch: usize,
    seq_len: usize,
    ids: Vec<usize>,
    blocks: Vec<BlockCache>,
    /// Input to the final normalization
    x_final: Vec<f32>,
    x_norm_final: Vec<f32>,
}

/// Gradients for every parameter, in the same structure as the model.
///
/// `trainable` flattens these into slices ordered exactly like
/// `CausalLM::trainable_parameters_mut`, so the optimizer can zip the two.
pub struct Gradients {
    pub token_embedding: Vec<f32>,
    pub position_embedding: Vec<f32>,
    pub blocks: Vec<BlockGrads>,
    pub lm_head: DenseGrads,
}

impl Gradients {
    /// Gradient slices for the optimizer, matching the ordering of
    /// `trainable_parameters_mut` for the given adaptation mode.
    pub fn trainable(&self, lora: bool) -> Vec<&[f32]> {
        if lora {
            let mut out: Vec<&[f32]> = Vec::new();
            for block in &self.blocks {
                // Adapter grads exist whenever LoRA is enabled.
                if let (Some(q), Some(v)) = (&block.attn.q_adapter, &block.attn.v_adapter) {
                    out.push(&q.a);
                    out.push(&q.b);
                    out.push(&v.a);
                    out.push(&v.b);
                }
            }
            out
        } else {
            let mut out: Vec<&[f32]> =
                vec![&self.token_embedding, &self.position_embedding];
            for block in &self.blocks {
                out.push(&block.attn.q.weight);
                out.push(&block.attn.q.bias);
                out.push(&block.attn.k.weight);
                out.push(&block.attn.k.bias);
                out.push(&block.attn.v.weight);
                out.push(&block.attn.v.bias);
                out.push(&block.attn.out.weight);
                out.push(&block.attn.out.bias);
                out.push(&block.fc1.weight);
                out.push(&block.fc1.bias);
                out.push(&block.fc2.weight);
                out.push(&block.fc2.bias);
            }
            out.push(&self.lm_head.weight);
            out.push(&self.lm_head.bias);
            out
        }
    }
}

/// The causal language model.
pub struct CausalLM {
    config: ModelConfig,
    /// Token embedding table, shape [vocab_size, n_embd]
    token_embedding: Tensor,
    /// Learned position embeddings, shape [sequence_len, n_embd]
    position_embedding: Tensor,
    blocks: Vec<Block>,
    lm_head: Dense,
}

impl CausalLM {
    pub fn new(config: ModelConfig) -> Self {
        // Deterministic small init; preset weights overwrite this on load.
        let tok_data: Vec<f32> = (0..config.vocab_size * config.n_embd)
            .map(|i| (i as f32 * 0.31).sin() * 0.02)
            .collect();
        let pos_data: Vec<f32> = (0..config.sequence_len * config.n_embd)
            .map(|i| (i as f32 * 0.17).cos() * 0.02)
            .collect();

        let token_embedding = Tensor::new(&tok_data, &[config.vocab_size, config.n_embd]);
        let position_embedding =
            Tensor::new(&pos_data, &[config.sequence_len, config.n_embd]);
        let blocks = (0..config.n_layer).map(|_| Block::new(&config)).collect();
        let lm_head = Dense::new(config.n_embd, config.vocab_size);

        Self {
            config,
            token_embedding,
            position_embedding,
            blocks,
            lm_head,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Forward pass: token IDs `[batch, seq_len]` to logits
    /// `[batch, seq_len, vocab_size]`.
    pub fn forward(&self, ids: &Tensor) -> Result<Tensor> {
        let (logits, _) = self.forward_with_cache(ids)?;
        Ok(logits)
    }

    /// Forward pass that also records every activation the backward pass
    /// needs.
    pub fn forward_with_cache(&self, ids: &Tensor) -> Result<(Tensor, ForwardCache)> {
        let shape = ids.shape();
        if shape.len() != 2 {
            anyhow::bail!("Expected [batch, seq_len] token IDs, got shape {:?}", shape);
        }
        let (batch, seq_len) = (shape[0], shape[1]);
        if seq_len > self.config.sequence_len {
            anyhow::bail!(
                "Sequence length {} exceeds model maximum {}",
                seq_len,
                self.config.sequence_len
            );
        }

        let n_embd = self.config.n_embd;
        let tok_data = self.token_embedding.data();
        let pos_data = self.position_embedding.data();
        let ids_data = ids.data();

        let mut id_cache = Vec::with_capacity(batch * seq_len);
        let mut hidden = vec![0.0f32; batch * seq_len * n_embd];
        for b in 0..batch {
            for s in 0..seq_len {
                let id = ids_data[b * seq_len + s] as usize;
                if id >= self.config.vocab_size {
                    anyhow::bail!(
                        "Token ID {} out of range for vocab size {}",
                        id,
                        self.config.vocab_size
                    );
                }
                id_cache.push(id);
                let out = &mut hidden[(b * seq_len + s) * n_embd..(b * seq_len + s + 1) * n_embd];
                let tok = &tok_data[id * n_embd..(id + 1) * n_embd];
                let pos = &pos_data[s * n_embd..(s + 1) * n_embd];
                for i in 0..n_embd {
                    out[i] = tok[i] + pos[i];
                }
            }
        }

        let mut block_caches = Vec::with_capacity(self.blocks.len());
        let mut x = hidden;
        for block in &self.blocks {
            let (y, cache) = block.forward(x, batch, seq_len);
            block_caches.push(cache);
            x = y;
        }

        let x_norm_final = rms_norm_forward(&x, n_embd);
        let logits = self.lm_head.forward(&x_norm_final, batch * seq_len);
        let logits = Tensor::new(&logits, &[batch, seq_len, self.config.vocab_size]);

        Ok((
            logits,
            ForwardCache {
                batch,
                seq_len,
                ids: id_cache,
                blocks: block_caches,
                x_final: x,
                x_norm_final,
            },
        ))
    }

    /// Backward pass from logit gradients, returning gradients for every
    /// parameter. `dlogits` has the logits' layout,
    /// `[batch, seq_len, vocab_size]` flattened.
    pub fn backward(&self, cache: &ForwardCache, dlogits: &[f32]) -> Result<Gradients> {
        let rows = cache.batch * cache.seq_len;
        let n_embd = self.config.n_embd;
        if dlogits.len() != rows * self.config.vocab_size {
            anyhow::bail!(
                "Logit gradient length {} does not match {} positions x vocab {}",
                dlogits.len(),
                rows,
                self.config.vocab_size
            );
        }

        let mut grads = Gradients {
            token_embedding: vec![0.0; self.config.vocab_size * n_embd],
            position_embedding: vec![0.0; self.config.sequence_len * n_embd],
            blocks: self
                .blocks
                .iter()
                .map(|b| BlockGrads {
                    attn: b.attn.grads(),
                    fc1: DenseGrads::zeros(n_embd, 4 * n_embd),
                    fc2: DenseGrads::zeros(4 * n_embd, n_embd),
                })
                .collect(),
            lm_head: DenseGrads::zeros(n_embd, self.config.vocab_size),
        };

        let mut dx_norm_final = vec![0.0f32; rows * n_embd];
        self.lm_head.backward(
            &cache.x_norm_final,
            dlogits,
            rows,
            &mut dx_norm_final,
            &mut grads.lm_head,
        );
        let mut dx = rms_norm_backward(&cache.x_final, &dx_norm_final, n_embd);

        for (block, (block_cache, block_grads)) in self
            .blocks
            .iter()
            .zip(cache.blocks.iter().zip(grads.blocks.iter_mut()))
            .rev()
        {
            dx = block.backward(block_cache, &dx, cache.batch, cache.seq_len, block_grads);
        }

        for (row, &id) in cache.ids.iter().enumerate() {
            let dsrc = &dx[row * n_embd..(row + 1) * n_embd];
            let tok = &mut grads.token_embedding[id * n_embd..(id + 1) * n_embd];
            for (g, d) in tok.iter_mut().zip(dsrc) {
                *g += d;
            }
            let pos_row = row % cache.seq_len;
            let pos = &mut grads.position_embedding[pos_row * n_embd..(pos_row + 1) * n_embd];
            for (g, d) in pos.iter_mut().zip(dsrc) {
                *g += d;
            }
        }

        Ok(grads)
    }

    /// Inject LoRA adapters into every attention query and value projection.
    ///
    /// After this call the base weights are frozen: `trainable_parameters_mut`
    /// exposes only the adapter matrices.
    pub fn enable_lora(&mut self, rank: usize, alpha: f32) {
        for block in &mut self.blocks {
            block.attn.attach_lora(rank, alpha);
        }
    }

    pub fn lora_enabled(&self) -> bool {
        self.blocks.first().map(|b| b.attn.has_lora()).unwrap_or(false)
    }

    /// The (rank, alpha) of the injected adapters, if any.
    pub fn lora_config(&self) -> Option<(usize, f32)> {
        self.blocks.first().and_then(|b| b.attn.q_proj.lora_config())
    }

    /// Parameters the optimizer should update: all parameters normally, only
    /// the LoRA adapter matrices once `enable_lora` has been called.
    pub fn trainable_parameters_mut(&mut self) -> Vec<&mut Tensor> {
        if self.lora_enabled() {
            let mut params = Vec::new();
            for block in &mut self.blocks {
                params.extend(block.attn.trainable_parameters_mut());
            }
            params
        } else {
            self.parameters_mut()
        }
    }

    /// Total parameter count.
    pub fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|t| t.data().len()).sum()
    }

    /// Number of scalars the optimizer will update.
    pub fn trainable_parameter_count(&mut self) -> usize {
        self.trainable_parameters_mut()
            .iter()
            .map(|t| t.data().len())
            .sum()
    }
}

impl Module for CausalLM {
    /// Trait adapter over the inherent, fallible `forward`.
    ///
    /// Precondition: `input` must be valid `[batch, seq_len]` token IDs, with
    /// `seq_len` within the configured maximum and every ID inside the vocab.
    /// All callers in this workspace go through the inherent `forward` and get
    /// a `Result`; this impl exists for serialization and panics on invalid
    /// input.
    fn forward(&self, input: &Tensor) -> Tensor {
        match self.forward(input) {
            Ok(logits) => logits,
            Err(err) => panic!("CausalLM forward precondition violated: {err}"),
        }
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = vec![&self.token_embedding, &self.position_embedding];
        for block in &self.blocks {
            params.extend(block.attn.q_proj.parameters());
            params.extend(block.attn.k_proj.parameters());
            params.extend(block.attn.v_proj.parameters());
            params.extend(block.attn.out_proj.parameters());
            params.extend(block.fc1.parameters());
            params.extend(block.fc2.parameters());
        }
        params.extend(self.lm_head.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Tensor> {
        let mut params = vec![&mut self.token_embedding, &mut self.position_embedding];
        for block in &mut self.blocks {
            params.extend(block.attn.q_proj.parameters_mut());
            params.extend(block.attn.k_proj.parameters_mut());
            params.extend(block.attn.v_proj.parameters_mut());
            params.extend(block.attn.out_proj.parameters_mut());
            params.extend(block.fc1.parameters_mut());
            params.extend(block.fc2.parameters_mut());
        }
        params.extend(self.lm_head.parameters_mut());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_shape() {
        let config = ModelConfig::tiny();
        let vocab = config.vocab_size;
        let model = CausalLM::new(config);

        let ids = Tensor::new(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let logits = model.forward(&ids).unwrap();
        assert_eq!(logits.shape(), &[2, 3, vocab]);
    }

    #[test]
    fn test_forward_rejects_long_sequence() {
        let config = ModelConfig::tiny();
        let model = CausalLM::new(config.clone());

        let too_long = vec![0.0; config.sequence_len + 1];
        let ids = Tensor::new(&too_long, &[1, config.sequence_len + 1]);
        assert!(model.forward(&ids).is_err());
    }

    #[test]
    fn test_forward_rejects_out_of_vocab_id() {
        let config = ModelConfig::tiny();
        let model = CausalLM::new(config.clone());

        let ids = Tensor::new(&[config.vocab_size as f32], &[1, 1]);
        assert!(model.forward(&ids).is_err());
    }

    #[test]
    fn test_enable_lora_shrinks_trainable_parameters() {
        let mut model = CausalLM::new(ModelConfig::tiny());
        let full = model.trainable_parameter_count();

        model.enable_lora(4, 4.0);
        assert!(model.lora_enabled());
        let adapted = model.trainable_parameter_count();

        assert!(adapted < full);
        // One block, two adapted projections, two matrices each.
        assert_eq!(model.trainable_parameters_mut().len(), 4);
    }

    #[test]
    fn test_lora_forward_unchanged_at_init() {
        let config = ModelConfig::tiny();
        let mut model = CausalLM::new(config);
        let ids = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);

        let before = model.forward(&ids).unwrap();
        model.enable_lora(2, 2.0);
        let after = model.forward(&ids).unwrap();

        for (a, b) in before.data().iter().zip(after.data()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_causal_masking() {
        // Changing a future token must not affect logits at earlier positions.
        let config = ModelConfig::tiny();
        let vocab = config.vocab_size;
        let model = CausalLM::new(config);

        let a = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);
        let b = Tensor::new(&[1.0, 2.0, 9.0], &[1, 3]);

        let logits_a = model.forward(&a).unwrap();
        let logits_b = model.forward(&b).unwrap();

        // Positions 0 and 1 see identical context.
        for i in 0..2 * vocab {
            assert!((logits_a.data()[i] - logits_b.data()[i]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_gradient_slices_match_trainable_ordering() {
        let mut model = CausalLM::new(ModelConfig::tiny());
        let ids = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);

        let (logits, cache) = model.forward_with_cache(&ids).unwrap();
        let dlogits = vec![0.1f32; logits.data().len()];

        // Full fine-tuning: every slice pairs with its parameter by shape.
        let grads = model.backward(&cache, &dlogits).unwrap();
        let slices = grads.trainable(false);
        let params = model.trainable_parameters_mut();
        assert_eq!(slices.len(), params.len());
        for (slice, param) in slices.iter().zip(&params) {
            assert_eq!(slice.len(), param.data().len());
        }
    }

    #[test]
    fn test_lora_gradient_slices_match_trainable_ordering() {
        let mut model = CausalLM::new(ModelConfig::tiny());
        model.enable_lora(2, 2.0);
        let ids = Tensor::new(&[1.0, 2.0, 3.0], &[1, 3]);

        let (logits, cache) = model.forward_with_cache(&ids).unwrap();
        let dlogits = vec![0.1f32; logits.data().len()];

        let grads = model.backward(&cache, &dlogits).unwrap();
        let slices = grads.trainable(true);
        let params = model.trainable_parameters_mut();
        assert_eq!(slices.len(), params.len());
        for (slice, param) in slices.iter().zip(&params) {
            assert_eq!(slice.len(), param.data().len());
        }
    }
}
