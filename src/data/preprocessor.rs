// ============================================================
// Layer 4 — Preprocessor
// ============================================================
// Two independent cleanup steps run before tokenisation and
// batching:
//
//   clean_text        transcript → one tidy line
//     1. Unicode whitespace variants become a plain space
//     2. Control characters are dropped
//     3. Runs of spaces collapse to one, edges are trimmed
//
//   normalize_frames  per-utterance CMVN
//     every feature column is shifted to zero mean and scaled to
//     unit variance over the frames of that utterance. Columns
//     with (almost) no variance are only centred.
//
// Reference: Rust Book §8 (Strings in Rust)

/// Variance below this is treated as a constant column.
pub const VARIANCE_FLOOR: f32 = 1e-10;

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a transcript into a single line for the tokenizer.
    pub fn clean_text(&self, text: &str) -> String {
        let mut out        = String::with_capacity(text.len());
        let mut last_space = true;

        for c in text.chars() {
            let c = match c {
                '\t' | '\n' | '\r' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' | '\u{3000}' => ' ',
                c if c.is_control() => continue,
                c if c.is_whitespace() => ' ',
                c => c,
            };
            if c == ' ' {
                if !last_space {
                    out.push(' ');
                }
                last_space = true;
            } else {
                out.push(c);
                last_space = false;
            }
        }

        out.trim_end().to_string()
    }

    /// Mean/variance-normalise each feature column in place.
    pub fn normalize_frames(&self, frames: &mut [Vec<f32>]) {
        let n = frames.len();
        let dim = frames.first().map_or(0, Vec::len);
        if n == 0 || dim == 0 {
            return;
        }

        let mut mean = vec![0.0f64; dim];
        for frame in frames.iter() {
            for (m, &v) in mean.iter_mut().zip(frame) {
                *m += v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n as f64);

        let mut var = vec![0.0f64; dim];
        for frame in frames.iter() {
            for ((s, &v), m) in var.iter_mut().zip(frame).zip(&mean) {
                let d = v as f64 - m;
                *s += d * d;
            }
        }
        var.iter_mut().for_each(|s| *s /= n as f64);

        for frame in frames.iter_mut() {
            for ((v, m), s) in frame.iter_mut().zip(&mean).zip(&var) {
                let centred = *v as f64 - m;
                *v = if *s > VARIANCE_FLOOR as f64 {
                    (centred / s.sqrt()) as f32
                } else {
                    centred as f32
                };
            }
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
