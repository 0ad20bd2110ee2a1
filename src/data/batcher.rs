// ============================================================
// Layer 4 — Prosody Batcher
// ============================================================
// Turns a Vec<ProsodySample> into the four tensors the model's
// forward pass takes.
//
// Utterances differ in both frame count and token count, so
// everything is padded to the longest item of the batch:
//
//   mfcc           [N, T_max, F]   pad frames are all zeros
//   mfcc_mask      [N, T_max]      1 = real frame, 0 = pad
//   input_ids      [N, S_max]      pad id 0 ([PAD])
//   attention_mask [N, S_max]      1 = real token, 0 = pad
//
// Every sample must already have frames of width F; the Tagger
// checks that before anything reaches the batcher.
//
// Reference: Burn Book §4 (Batcher)

use burn::prelude::*;

use crate::data::dataset::ProsodySample;

/// A padded batch ready for ProsodyExtractor::forward.
#[derive(Debug, Clone)]
pub struct ProsodyBatch<B: Backend> {
    pub mfcc:           Tensor<B, 3>,
    pub mfcc_mask:      Tensor<B, 2, Int>,
    pub input_ids:      Tensor<B, 2, Int>,
    pub attention_mask: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct ProsodyBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ProsodyBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch(&self, items: &[ProsodySample]) -> ProsodyBatch<B> {
        let batch_size  = items.len();
        let feature_dim = items.first().map_or(0, ProsodySample::feature_dim);
        let max_frames  = items.iter().map(ProsodySample::num_frames).max().unwrap_or(0);
        let max_tokens  = items.iter().map(ProsodySample::num_tokens).max().unwrap_or(0);

        // ── Frames ────────────────────────────────────────────────────────────
        let mut mfcc_flat = Vec::with_capacity(batch_size * max_frames * feature_dim);
        let mut frame_mask: Vec<i32> = Vec::with_capacity(batch_size * max_frames);
        for item in items {
            for frame in &item.frames {
                mfcc_flat.extend_from_slice(frame);
            }
            let pad = max_frames - item.num_frames();
            mfcc_flat.extend(std::iter::repeat(0.0f32).take(pad * feature_dim));
            frame_mask.extend(std::iter::repeat(1).take(item.num_frames()));
            frame_mask.extend(std::iter::repeat(0).take(pad));
        }

        // ── Tokens ────────────────────────────────────────────────────────────
        let mut ids_flat:  Vec<i32> = Vec::with_capacity(batch_size * max_tokens);
        let mut mask_flat: Vec<i32> = Vec::with_capacity(batch_size * max_tokens);
        for item in items {
            let pad = max_tokens - item.num_tokens();
            ids_flat.extend(item.input_ids.iter().map(|&x| x as i32));
            ids_flat.extend(std::iter::repeat(0).take(pad));
            mask_flat.extend(item.attention_mask.iter().map(|&x| x as i32));
            mask_flat.extend(std::iter::repeat(0).take(pad));
        }

        let mfcc = Tensor::<B, 1>::from_floats(mfcc_flat.as_slice(), &self.device)
            .reshape([batch_size, max_frames, feature_dim]);
        let mfcc_mask = Tensor::<B, 1, Int>::from_ints(frame_mask.as_slice(), &self.device)
            .reshape([batch_size, max_frames]);
        let input_ids = Tensor::<B, 1, Int>::from_ints(ids_flat.as_slice(), &self.device)
            .reshape([batch_size, max_tokens]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), &self.device)
            .reshape([batch_size, max_tokens]);

        ProsodyBatch { mfcc, mfcc_mask, input_ids, attention_mask }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    fn sample(frames: usize, ids: &[u32]) -> ProsodySample {
        ProsodySample {
            id:             format!("{frames}"),
            frames:         (0..frames).map(|i| vec![i as f32 + 1.0; 3]).collect(),
            input_ids:      ids.to_vec(),
            attention_mask: vec![1; ids.len()],
            tokens:         ids.iter().map(|i| i.to_string()).collect(),
            special:        vec![false; ids.len()],
        }
    }

    #[test]
    fn test_pads_to_longest_item() {
        let batcher = ProsodyBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(&[sample(4, &[101, 5, 102]), sample(2, &[101, 102])]);

        assert_eq!(batch.mfcc.dims(), [2, 4, 3]);
        assert_eq!(batch.input_ids.dims(), [2, 3]);

        let frame_mask: Vec<i64> = batch.mfcc_mask.into_data().iter::<i64>().collect();
        assert_eq!(frame_mask, vec![1, 1, 1, 1, 1, 1, 0, 0]);

        let ids: Vec<i64> = batch.input_ids.into_data().iter::<i64>().collect();
        assert_eq!(ids, vec![101, 5, 102, 101, 102, 0]);

        let tokens: Vec<i64> = batch.attention_mask.into_data().iter::<i64>().collect();
        assert_eq!(tokens, vec![1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_pad_frames_are_zero() {
        let batcher = ProsodyBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(&[sample(3, &[1]), sample(1, &[1])]);

        let values: Vec<f32> = batch.mfcc.into_data().iter::<f32>().collect();
        // Second item: frame 0 is real (1.0), frames 1..3 are padding
        assert_eq!(&values[9..12], &[1.0, 1.0, 1.0]);
        assert!(values[12..].iter().all(|v| *v == 0.0));
    }
}
