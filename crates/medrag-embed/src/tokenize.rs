use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use medrag_core::traits::TokenCodec;

/// Tokenize a batch, truncating to `max_len` and right-padding to the
/// longest sequence. Returns `(input_ids, attention_mask)`, both `[B,T]`.
pub fn tokenize_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
    let mut rows = Vec::with_capacity(texts.len());
    for text in texts {
        let enc = tokenizer.encode(text.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        let mut ids = enc.get_ids().to_vec();
        let mut mask = enc.get_attention_mask().to_vec();
        truncate_keeping_sep(&mut ids, &mut mask, enc.get_special_tokens_mask(), max_len);
        rows.push((ids, mask));
    }
    let width = rows.iter().map(|(ids, _)| ids.len()).max().unwrap_or(0).max(1);
    let mut flat_ids = Vec::with_capacity(rows.len() * width);
    let mut flat_mask = Vec::with_capacity(rows.len() * width);
    for (mut ids, mut mask) in rows {
        let pad = width - ids.len();
        ids.extend(std::iter::repeat(pad_id).take(pad));
        mask.extend(std::iter::repeat(0).take(pad));
        flat_ids.extend(ids);
        flat_mask.extend(mask);
    }
    let input_ids = Tensor::from_vec(flat_ids, (texts.len(), width), device)?;
    let attention_mask = Tensor::from_vec(flat_mask, (texts.len(), width), device)?;
    Ok((input_ids, attention_mask))
}

/// Cut a row to `max_len` tokens; a trailing special token ([SEP]) stays last.
fn truncate_keeping_sep(ids: &mut Vec<u32>, mask: &mut Vec<u32>, special: &[u32], max_len: usize) {
    if ids.len() <= max_len { return; }
    let sep = match (special.last(), ids.last()) { (Some(1), Some(&last)) if max_len > 1 => Some(last), _ => None };
    ids.truncate(max_len);
    mask.truncate(max_len);
    if let (Some(sep), Some(slot)) = (sep, ids.last_mut()) { *slot = sep; }
}

/// The embedding model's tokenizer exposed to the chunker: no special
/// tokens, no truncation, no padding.
#[derive(Clone)]
pub struct HfTokenCodec {
    tokenizer: Tokenizer,
}

impl HfTokenCodec {
    pub fn new(mut tokenizer: Tokenizer) -> Self {
        let _ = tokenizer.with_truncation(None);
        let _ = tokenizer.with_padding(None);
        Self { tokenizer }
    }
}

impl TokenCodec for HfTokenCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self.tokenizer.encode(text, false).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(enc.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        self.tokenizer.decode(ids, true).map_err(|e| anyhow!("Detokenization failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_keeping_sep;

    #[test]
    fn truncation_keeps_trailing_sep() {
        let (mut ids, mut mask) = (vec![101, 7, 8, 9, 102], vec![1; 5]);
        truncate_keeping_sep(&mut ids, &mut mask, &[1, 0, 0, 0, 1], 4);
        assert_eq!(ids, vec![101, 7, 8, 102]);
        assert_eq!(mask.len(), 4);
    }

    #[test]
    fn short_rows_are_untouched() {
        let (mut ids, mut mask) = (vec![101, 7, 102], vec![1; 3]);
        truncate_keeping_sep(&mut ids, &mut mask, &[1, 0, 1], 8);
        assert_eq!(ids, vec![101, 7, 102]);
    }
}
