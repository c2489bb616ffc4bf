//! Bigram frequency quantization.
//!
//! The headroom between a target word's unigram frequency and 255 is cut
//! into 16.5 steps. Nibble `n` stands for the middle of step `n + 1`, so the
//! stored value lies between 0.5 and 16.5 steps above the unigram frequency.

use log::warn;

use crate::format::{MAX_BIGRAM_FREQUENCY, MAX_TERMINAL_FREQUENCY};

fn step_size(unigram_frequency: u32) -> f32 {
    (MAX_TERMINAL_FREQUENCY as f32 - unigram_frequency as f32)
        / (1.5 + MAX_BIGRAM_FREQUENCY as f32)
}

/// Quantize `bigram_frequency` (0..=255) into a nibble relative to the
/// unigram frequency of the word it points to.
///
/// A bigram weaker than its target unigram is raised to the unigram value.
/// Bigrams less than half a step above the unigram store 0, which reads back
/// slightly too high.
pub fn quantize(unigram_frequency: u32, bigram_frequency: u32, word: &str) -> u8 {
    let mut bigram_frequency = bigram_frequency;
    if unigram_frequency > bigram_frequency {
        warn!(
            "unigram frequency {unigram_frequency} of \"{word}\" exceeds its bigram frequency \
             {bigram_frequency}; using the unigram frequency"
        );
        bigram_frequency = unigram_frequency;
    }
    let step = step_size(unigram_frequency);
    let first_step_start = 1.0 + unigram_frequency as f32 + step / 2.0;
    let discretized = ((bigram_frequency as f32 - first_step_start) / step) as i32;
    (discretized.max(0) as u8) & crate::format::MASK_ATTRIBUTE_FREQUENCY
}

/// Best estimate of the original bigram frequency for a stored nibble.
pub fn reconstruct(unigram_frequency: u32, nibble: u8) -> u32 {
    let step = step_size(unigram_frequency);
    (unigram_frequency as f32 + step * (f32::from(nibble) + 1.0)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_quick_stays_within_one_step() {
        let nibble = quantize(200, 210, "quick");
        assert!(nibble <= 15);
        let back = reconstruct(200, nibble);
        let step = step_size(200);
        assert!((back as f32 - 210.0).abs() <= step + 2.0, "{back}");
    }

    #[test]
    fn below_unigram_is_clamped_then_stored_as_zero() {
        assert_eq!(quantize(100, 50, "w"), 0);
        assert_eq!(quantize(100, 100, "w"), 0);
    }

    #[test]
    fn maximum_frequency_uses_top_nibble() {
        assert_eq!(quantize(0, 255, "w"), 15);
        assert_eq!(reconstruct(0, 15), 247);
    }

    #[test]
    fn every_bigram_frequency_reconstructs_within_a_step() {
        for unigram in (0..=255u32).step_by(15) {
            let step = step_size(unigram);
            for bigram in unigram..=255 {
                let back = reconstruct(unigram, quantize(unigram, bigram, "w"));
                // Reconstruction truncates to an integer, hence the extra unit.
                assert!(
                    (back as f32 - bigram as f32).abs() <= step + 2.0,
                    "unigram {unigram} bigram {bigram} came back as {back}"
                );
            }
        }
    }
}
