use std::collections::BTreeMap;

use lexdict::{
    bigram, container, decode, encode, Dictionary, DictionaryOptions, FormatOptions,
    WeightedString,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Sample {
    words: BTreeMap<String, u32>,
    shortcuts: Vec<(usize, String, u32)>,
    bigrams: Vec<(usize, usize, u32)>,
}

fn sample() -> impl Strategy<Value = Sample> {
    prop::collection::btree_map("[a-e]{1,6}", 0u32..=255, 1..40).prop_flat_map(|words| {
        let n = words.len();
        (
            Just(words),
            prop::collection::vec((0..n, "[x-z]{1,3}", 0u32..=15), 0..5),
            prop::collection::vec((0..n, 0..n, 0u32..=255), 0..10),
        )
            .prop_map(|(words, shortcuts, bigrams)| Sample {
                words,
                shortcuts,
                bigrams,
            })
    })
}

fn build(s: &Sample) -> Dictionary {
    let list: Vec<(&String, &u32)> = s.words.iter().collect();
    let mut d = Dictionary::new(DictionaryOptions::new("prop", "en"));
    for (i, (word, &frequency)) in list.iter().enumerate() {
        let shortcuts: Vec<WeightedString> = s
            .shortcuts
            .iter()
            .filter(|(owner, ..)| *owner == i)
            .map(|(_, target, f)| WeightedString::new(target.clone(), *f))
            .collect();
        d.add(word, frequency, &shortcuts, false).unwrap();
    }
    for &(from, to, frequency) in &s.bigrams {
        d.set_bigram(list[from].0, list[to].0, frequency).unwrap();
    }
    d
}

fn check(original: &Dictionary, back: &Dictionary) -> Result<(), TestCaseError> {
    let words: Vec<(String, u8)> = original.words().map(|w| (w.word, w.frequency)).collect();
    let decoded: Vec<(String, u8)> = back.words().map(|w| (w.word, w.frequency)).collect();
    prop_assert_eq!(words, decoded);

    for w in original.words() {
        let node = back.node(back.find_word(&w.word).unwrap());
        prop_assert_eq!(node.shortcuts().len(), w.shortcuts.len());
        prop_assert_eq!(node.bigrams().len(), w.bigrams.len());
        for b in &w.bigrams {
            let got = node.bigrams().iter().find(|x| x.word == b.word).unwrap();
            let unigram = u32::from(original.frequency_of(&b.word).unwrap());
            let step = (255.0 - unigram as f32) / 16.5;
            let wanted = b.frequency.max(unigram) as f32;
            prop_assert!(
                (got.frequency as f32 - wanted).abs() <= step + 2.0,
                "{} -> {}: wanted {}, got {}",
                w.word,
                b.word,
                wanted,
                got.frequency
            );
            prop_assert_eq!(
                got.frequency,
                bigram::reconstruct(unigram, bigram::quantize(unigram, b.frequency, &b.word))
            );
        }
    }
    Ok(())
}

proptest! {
    #[test]
    fn blob_roundtrip(s in sample(), version in 2u16..=3, dynamic in any::<bool>()) {
        let d = build(&s);
        let dynamic = dynamic && version >= 3;
        let bytes = encode(&d, &FormatOptions::new(version, dynamic).unwrap()).unwrap();
        let back = decode(&bytes).unwrap();
        check(&d, &back)?;
        prop_assert!(back.check_ordering());
    }

    #[test]
    fn split_roundtrip(s in sample(), dynamic in any::<bool>()) {
        let d = build(&s);
        let split = container::encode_split(&d, &FormatOptions::new(4, dynamic).unwrap()).unwrap();
        let back = container::decode_split(&split).unwrap();
        check(&d, &back)?;
    }

    #[test]
    fn encoding_is_deterministic(s in sample()) {
        let d = build(&s);
        let options = FormatOptions::new(3, true).unwrap();
        prop_assert_eq!(encode(&d, &options).unwrap(), encode(&d, &options).unwrap());
    }
}
