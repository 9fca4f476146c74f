//! CTC Greedy Decoding
//!
//! Collapses the model's per-timestep class probabilities into text:
//! argmax per timestep, merge consecutive repeats, drop the blank class,
//! then map the remaining class indices through the vocabulary.

/// Decode `[steps * classes]` logits (or probabilities) into text.
///
/// Class layout: index 0 is the out-of-vocabulary slot (decodes to
/// nothing), indices 1..=vocab.len() are characters, the last index is
/// the CTC blank. The decoded label sequence is truncated to `max_len`.
pub fn ctc_greedy_decode(
    logits: &[f32],
    steps: usize,
    classes: usize,
    vocab: &[String],
    max_len: usize,
) -> String {
    debug_assert!(logits.len() >= steps * classes);

    let blank = classes - 1;
    let mut text = String::new();
    let mut emitted = 0usize;
    let mut prev = blank;

    for t in 0..steps {
        let row = &logits[t * classes..(t + 1) * classes];
        let best = argmax(row);

        if best != blank && best != prev {
            if emitted == max_len {
                break;
            }
            emitted += 1;
            // Index 0 is the OOV slot; it has no character to emit.
            if best > 0 {
                if let Some(ch) = vocab.get(best - 1) {
                    text.push_str(ch);
                }
            }
        }
        prev = best;
    }

    text
}

fn argmax(row: &[f32]) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
    }

    /// Build a logits row with the given winning class.
    fn row(classes: usize, winner: usize) -> Vec<f32> {
        let mut r = vec![0.0; classes];
        r[winner] = 1.0;
        r
    }

    fn logits(classes: usize, winners: &[usize]) -> Vec<f32> {
        winners.iter().flat_map(|&w| row(classes, w)).collect()
    }

    #[test]
    fn test_collapse_repeats() {
        // classes: 0 = OOV, 1..=3 = a/b/c, 4 = blank
        let data = logits(5, &[1, 1, 1, 2, 2, 3]);
        assert_eq!(ctc_greedy_decode(&data, 6, 5, &vocab(), 5), "abc");
    }

    #[test]
    fn test_blank_separates_repeats() {
        // "aa" requires a blank between the two a's.
        let data = logits(5, &[1, 4, 1]);
        assert_eq!(ctc_greedy_decode(&data, 3, 5, &vocab(), 5), "aa");
    }

    #[test]
    fn test_leading_and_trailing_blanks() {
        let data = logits(5, &[4, 4, 2, 4, 4]);
        assert_eq!(ctc_greedy_decode(&data, 5, 5, &vocab(), 5), "b");
    }

    #[test]
    fn test_oov_class_emits_nothing() {
        let data = logits(5, &[0, 1, 0, 2]);
        assert_eq!(ctc_greedy_decode(&data, 4, 5, &vocab(), 5), "ab");
    }

    #[test]
    fn test_truncates_to_max_len() {
        let data = logits(5, &[1, 4, 2, 4, 3, 4, 1, 4, 2, 4, 3]);
        assert_eq!(ctc_greedy_decode(&data, 11, 5, &vocab(), 5), "abcab");
    }

    #[test]
    fn test_all_blank_is_empty() {
        let data = logits(5, &[4, 4, 4]);
        assert_eq!(ctc_greedy_decode(&data, 3, 5, &vocab(), 5), "");
    }
}
