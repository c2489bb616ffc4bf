//! Decoded word view, whole-dictionary comparison and merging.

use serde::{Deserialize, Serialize};

use crate::dictionary::{Dictionary, Entry, WeightedString};
use crate::error::Result;

/// A stored word with everything attached to its terminal node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub frequency: u8,
    pub shortcuts: Vec<WeightedString>,
    pub bigrams: Vec<WeightedString>,
    pub not_a_word: bool,
    pub blacklisted: bool,
}

impl Word {
    /// Equality that ignores the order of attribute lists.
    pub fn same_as(&self, other: &Word) -> bool {
        self.word == other.word
            && self.frequency == other.frequency
            && self.not_a_word == other.not_a_word
            && self.blacklisted == other.blacklisted
            && same_targets(&self.shortcuts, &other.shortcuts)
            && same_targets(&self.bigrams, &other.bigrams)
    }
}

fn same_targets(a: &[WeightedString], b: &[WeightedString]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

/// Add every word of `source` to `target`. Unigrams go in first so that
/// bigram targets already exist when bigrams are registered.
pub fn merge_into(target: &mut Dictionary, source: &Dictionary) -> Result<()> {
    for w in source.words() {
        target.insert(
            &w.word,
            Entry {
                frequency: u32::from(w.frequency),
                shortcuts: &w.shortcuts,
                bigrams: &[],
                not_a_word: w.not_a_word,
                blacklisted: w.blacklisted,
            },
        )?;
    }
    for w in source.words() {
        for bigram in &w.bigrams {
            target.set_bigram(&w.word, &bigram.word, bigram.frequency)?;
        }
    }
    Ok(())
}

/// Whether two dictionaries hold the same words with the same attributes.
pub fn same_words(a: &Dictionary, b: &Dictionary) -> bool {
    let mut left = a.words();
    let mut right = b.words();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(x), Some(y)) if x.same_as(&y) => continue,
            _ => return false,
        }
    }
}
