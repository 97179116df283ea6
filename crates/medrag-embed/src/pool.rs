use anyhow::{ensure, Result};
use candle_core::{DType, Tensor};

use medrag_core::config::Pooling;

fn l2_rows(x: &Tensor) -> Result<Tensor> {
    let eps_val = match x.dtype() { DType::F16 => 1e-6f32, _ => 1e-12f32 };
    let eps = Tensor::new(&[eps_val], x.device())?.to_dtype(x.dtype())?.unsqueeze(0)?;
    let norm = x.sqr()?.sum_keepdim(1)?.sqrt()?;
    let norm = norm.broadcast_add(&eps)?;
    Ok(x.broadcast_div(&norm)?)
}

/// Mean of the unmasked token states, L2-normalized. `[B,T,H]` → `[B,H]`.
pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let dims = hidden.dims();
    ensure!(dims.len() == 3, "hidden shape must be [B,T,H], got {:?}", dims);
    let (batch, hidden_dim) = (dims[0], dims[2]);

    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let mask_3d = mask.unsqueeze(2)?;
    let mask_broadcast = mask_3d.broadcast_as(hidden.shape()).or_else(|_| mask_3d.repeat((1, 1, hidden_dim)))?;
    let masked = (hidden * &mask_broadcast)?;
    let sum = masked.sum(1)?;
    let lengths = mask.sum(1)?.unsqueeze(1)?.to_dtype(sum.dtype())?;
    let mean = sum.broadcast_div(&lengths)?;
    let out = l2_rows(&mean)?;
    ensure!(out.dims() == [batch, hidden_dim], "pooled shape {:?}", out.dims());
    Ok(out)
}

/// First-token state, L2-normalized. `[B,T,H]` → `[B,H]`.
pub fn cls_l2(hidden: &Tensor) -> Result<Tensor> {
    ensure!(hidden.dims().len() == 3, "hidden shape must be [B,T,H], got {:?}", hidden.dims());
    let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
    l2_rows(&cls)
}

pub fn pool(pooling: Pooling, hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    match pooling {
        Pooling::Mean => masked_mean_l2(hidden, attention_mask),
        Pooling::Cls => cls_l2(hidden),
    }
}
