//! Token-windowed chunking.
//!
//! Text is tokenized once, cut into windows of `max_tokens` tokens that
//! advance by `max_tokens - overlap_tokens`, and each window is detokenized
//! with the same codec. Windows are produced lazily; cloning a
//! [`TokenWindows`] restarts the sequence from its current position.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::traits::TokenCodec;
use crate::types::Chunk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 256, overlap_tokens: 48 }
    }
}

impl ChunkingConfig {
    /// Requires `0 < overlap_tokens < max_tokens`.
    pub fn validate(&self) -> Result<()> {
        if self.overlap_tokens == 0 || self.overlap_tokens >= self.max_tokens {
            return Err(Error::InvalidConfig(format!(
                "chunking requires 0 < overlap_tokens < max_tokens (got overlap={}, max={})",
                self.overlap_tokens, self.max_tokens
            )));
        }
        Ok(())
    }

    pub fn stride(&self) -> usize {
        self.max_tokens - self.overlap_tokens
    }
}

/// Token ranges of the windows over a sequence of `len` tokens.
///
/// The last window is the first one whose end reaches `len`, so no window is
/// fully contained in its predecessor.
#[derive(Debug, Clone)]
pub struct WindowRanges {
    len: usize,
    max_tokens: usize,
    stride: usize,
    next_start: usize,
    next_index: usize,
    done: bool,
}

impl WindowRanges {
    pub fn new(len: usize, config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            len,
            max_tokens: config.max_tokens,
            stride: config.stride(),
            next_start: 0,
            next_index: 0,
            done: len == 0,
        })
    }
}

impl Iterator for WindowRanges {
    type Item = (usize, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let start = self.next_start;
        let end = (start + self.max_tokens).min(self.len);
        let index = self.next_index;
        if end == self.len {
            self.done = true;
        } else {
            self.next_start = start + self.stride;
            self.next_index += 1;
        }
        Some((index, start..end))
    }
}

/// One detokenized window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub text: String,
    pub chunk_index: usize,
    pub tokens: Range<usize>,
}

/// Lazy sequence of detokenized windows.
pub struct TokenWindows<'a, C: TokenCodec + ?Sized> {
    codec: &'a C,
    ids: Arc<[u32]>,
    ranges: WindowRanges,
}

impl<C: TokenCodec + ?Sized> Clone for TokenWindows<'_, C> {
    fn clone(&self) -> Self {
        Self { codec: self.codec, ids: Arc::clone(&self.ids), ranges: self.ranges.clone() }
    }
}

impl<C: TokenCodec + ?Sized> TokenWindows<'_, C> {
    pub fn token_count(&self) -> usize {
        self.ids.len()
    }
}

impl<C: TokenCodec + ?Sized> Iterator for TokenWindows<'_, C> {
    type Item = Result<Window>;

    fn next(&mut self) -> Option<Self::Item> {
        let (chunk_index, tokens) = self.ranges.next()?;
        let decoded = self
            .codec
            .decode(&self.ids[tokens.clone()])
            .map_err(|e| Error::embedding(&e))
            .map(|text| Window { text, chunk_index, tokens });
        Some(decoded)
    }
}

/// Split `text` into overlapping token windows.
///
/// Empty text, or text that tokenizes to nothing, yields no windows. Text
/// that fits in one window yields a single window holding all of it.
pub fn chunk<'a, C: TokenCodec + ?Sized>(codec: &'a C, text: &str, config: &ChunkingConfig) -> Result<TokenWindows<'a, C>> {
    config.validate()?;
    let ids: Vec<u32> = if text.is_empty() { Vec::new() } else { codec.encode(text).map_err(|e| Error::embedding(&e))? };
    let ranges = WindowRanges::new(ids.len(), config)?;
    Ok(TokenWindows { codec, ids: ids.into(), ranges })
}

/// Chunk one entity's text into [`Chunk`]s, truncating each chunk's text to
/// at most `max_chars` characters.
pub fn chunk_entity<C: TokenCodec + ?Sized>(
    codec: &C,
    entity_id: &str,
    entity_name: &str,
    text: &str,
    config: &ChunkingConfig,
    max_chars: usize,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for window in chunk(codec, text, config)? {
        let window = window?;
        chunks.push(Chunk {
            entity_id: entity_id.to_string(),
            entity_name: entity_name.to_string(),
            chunk_index: window.chunk_index,
            text: truncate_chars(window.text, max_chars),
        });
    }
    Ok(chunks)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        tracing::warn!(max_chars, "truncating chunk text");
        text.truncate(byte_idx);
    }
    text
}

/// Whitespace word codec with a vocabulary grown on demand.
///
/// Pairs with the fake embedder when no model tokenizer is available.
/// Decoding joins words with single spaces.
#[derive(Default)]
pub struct WordCodec {
    vocab: RwLock<Vocab>,
}

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, u32>,
    words: Vec<String>,
}

impl WordCodec {
    pub fn new() -> Self { Self::default() }
}

impl TokenCodec for WordCodec {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<u32>> {
        let mut vocab = self.vocab.write().map_err(|_| anyhow::anyhow!("word vocabulary lock poisoned"))?;
        let mut out = Vec::new();
        for word in text.split_whitespace() {
            if let Some(&id) = vocab.ids.get(word) {
                out.push(id);
                continue;
            }
            let id = u32::try_from(vocab.words.len())?;
            vocab.words.push(word.to_string());
            vocab.ids.insert(word.to_string(), id);
            out.push(id);
        }
        Ok(out)
    }

    fn decode(&self, ids: &[u32]) -> anyhow::Result<String> {
        let vocab = self.vocab.read().map_err(|_| anyhow::anyhow!("word vocabulary lock poisoned"))?;
        let words = ids
            .iter()
            .map(|&id| vocab.words.get(id as usize).map(String::as_str).ok_or_else(|| anyhow::anyhow!("unknown token id {id}")))
            .collect::<anyhow::Result<Vec<&str>>>()?;
        Ok(words.join(" "))
    }
}
