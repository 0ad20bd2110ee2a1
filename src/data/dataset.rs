use serde::{Deserialize, Serialize};

/// One utterance ready for batching: normalised frames plus the
/// tokenised transcript. Sequence format: [CLS] tokens [SEP].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProsodySample {
    pub id:             String,
    pub frames:         Vec<Vec<f32>>,
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    /// Token strings, parallel to input_ids
    pub tokens:         Vec<String>,
    /// true for [CLS] / [SEP] and other tokenizer-added tokens
    pub special:        Vec<bool>,
}

impl ProsodySample {
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn num_tokens(&self) -> usize {
        self.input_ids.len()
    }

    pub fn feature_dim(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }
}

pub struct ProsodyDataset {
    samples: Vec<ProsodySample>,
}

impl ProsodyDataset {
    pub fn new(samples: Vec<ProsodySample>) -> Self { Self { samples } }

    pub fn len(&self) -> usize { self.samples.len() }

    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    pub fn get(&self, index: usize) -> Option<&ProsodySample> { self.samples.get(index) }

    /// Consecutive slices of at most `batch_size` samples.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = &[ProsodySample]> {
        self.samples.chunks(batch_size.max(1))
    }
}
