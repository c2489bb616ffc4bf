use std::collections::BTreeMap;

use lexdict::{
    decode, delete_word, encode, insert_word, lookup, read_unigrams_and_bigrams,
    terminal_position, Dictionary, DictionaryOptions, Entry, FormatOptions, WeightedString,
};
use proptest::prelude::*;

fn seed_buffer(words: &BTreeMap<String, u32>) -> Vec<u8> {
    let mut d = Dictionary::new(DictionaryOptions::new("dyn", "en"));
    for (w, &f) in words {
        d.add(w, f, &[], false).unwrap();
    }
    encode(&d, &FormatOptions::new(3, true).unwrap()).unwrap()
}

fn entry(frequency: u32) -> Entry<'static> {
    Entry {
        frequency,
        ..Entry::default()
    }
}

fn decoded(buf: &[u8]) -> BTreeMap<String, u32> {
    decode(buf)
        .unwrap()
        .words()
        .map(|w| (w.word, u32::from(w.frequency)))
        .collect()
}

#[derive(Debug, Clone)]
enum Op {
    Insert(String, u32),
    Delete(String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => ("[a-d]{1,5}", 0u32..=255).prop_map(|(w, f)| Op::Insert(w, f)),
        1 => "[a-d]{1,5}".prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn updates_match_a_rebuilt_dictionary(
        initial in prop::collection::btree_map("[a-d]{1,5}", 0u32..=255, 1..20),
        ops in prop::collection::vec(op(), 1..30),
    ) {
        let mut buf = seed_buffer(&initial);
        let mut expected = initial.clone();
        for op in &ops {
            match op {
                Op::Insert(w, f) => {
                    insert_word(&mut buf, w, entry(*f)).unwrap();
                    expected.insert(w.clone(), *f);
                }
                Op::Delete(w) => {
                    let removed = delete_word(&mut buf, w).unwrap();
                    prop_assert_eq!(removed, expected.remove(w).is_some());
                }
            }
        }
        prop_assert_eq!(decoded(&buf), expected.clone());
        for (w, &f) in &expected {
            prop_assert_eq!(lookup(&buf, w).unwrap(), Some(f as u8));
            prop_assert!(terminal_position(&buf, w).unwrap().is_some());
        }
        let flat = read_unigrams_and_bigrams(&buf).unwrap();
        let streamed: BTreeMap<String, u32> = flat
            .words
            .iter()
            .map(|(pos, w)| (w.clone(), u32::from(flat.frequencies[pos])))
            .collect();
        prop_assert_eq!(streamed, expected);
        prop_assert!(decode(&buf).unwrap().check_ordering());
    }
}

#[test]
fn inserted_attributes_survive() {
    let mut buf = seed_buffer(&BTreeMap::from([("world".to_string(), 150)]));
    let shortcuts = [WeightedString::new("wrld", 15)];
    let bigrams = [WeightedString::new("world", 200)];
    insert_word(
        &mut buf,
        "hello",
        Entry {
            frequency: 120,
            shortcuts: &shortcuts,
            bigrams: &bigrams,
            not_a_word: true,
            blacklisted: false,
        },
    )
    .unwrap();
    let d = decode(&buf).unwrap();
    let hello = d.node(d.find_word("hello").unwrap());
    assert_eq!(hello.frequency(), Some(120));
    assert_eq!(hello.shortcuts(), &shortcuts);
    assert_eq!(hello.bigrams().len(), 1);
    assert_eq!(hello.bigrams()[0].word, "world");
    assert!(hello.is_not_a_word());
    assert!(!hello.is_blacklisted());
}

#[test]
fn static_and_split_files_are_not_updated() {
    let mut d = Dictionary::new(DictionaryOptions::new("dyn", "en"));
    d.add("a", 1, &[], false).unwrap();
    let mut buf = encode(&d, &FormatOptions::new(2, false).unwrap()).unwrap();
    let before = buf.clone();
    assert!(insert_word(&mut buf, "b", entry(1)).is_err());
    assert_eq!(buf, before);
}

#[test]
fn failed_insert_leaves_the_buffer_untouched() {
    let initial: BTreeMap<String, u32> = [("abcd", 10), ("abcdef", 20), ("xyz", 30)]
        .into_iter()
        .map(|(w, f)| (w.to_string(), f))
        .collect();
    let mut buf = seed_buffer(&initial);
    // Appended nodes land beyond the reach of a signed 24 bit offset.
    buf.resize(buf.len() + 0x80_0010, 0);
    let before = buf.clone();

    for word in ["abc", "abx", "abcd"] {
        assert!(insert_word(&mut buf, word, entry(5)).is_err(), "{word}");
        assert!(buf == before, "inserting {word} changed the buffer");
    }
    assert_eq!(lookup(&buf, "abcd").unwrap(), Some(10));
    assert_eq!(decoded(&buf), initial);
}
