use lexdict::compress::Layout;
use lexdict::{encode, read_header, Dictionary, DictionaryOptions, FormatOptions};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_dictionary(seed: u64, words: usize) -> Dictionary {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut d = Dictionary::new(DictionaryOptions::new("compress", "en"));
    let mut list = Vec::new();
    for _ in 0..words {
        let len = rng.gen_range(1..12);
        let word: String = (0..len)
            .map(|_| {
                if rng.gen_bool(0.1) {
                    char::from_u32(rng.gen_range(0x3041..0x3097)).unwrap_or('x')
                } else {
                    rng.gen_range(b'a'..=b'z') as char
                }
            })
            .collect();
        d.add(&word, rng.gen_range(0..=255), &[], false).unwrap();
        list.push(word);
    }
    for _ in 0..words / 4 {
        let from = &list[rng.gen_range(0..list.len())];
        let to = &list[rng.gen_range(0..list.len())];
        d.set_bigram(from, to, rng.gen_range(0..=255)).unwrap();
    }
    d
}

fn options() -> Vec<FormatOptions> {
    vec![
        FormatOptions::new(2, false).unwrap(),
        FormatOptions::new(3, true).unwrap(),
        FormatOptions::new(4, false).unwrap(),
    ]
}

#[test]
fn a_second_pass_changes_nothing() {
    for seed in 0..5 {
        let d = random_dictionary(seed, 600);
        for opts in options() {
            let mut layout = Layout::compute(&d, &opts).unwrap();
            let before = layout.total_size();
            assert!(!layout.refine(&d, &opts).unwrap());
            assert_eq!(layout.total_size(), before);
            layout.check_contiguous().unwrap();
        }
    }
}

#[test]
fn array_sizes_never_grow_across_passes() {
    let d = random_dictionary(42, 2000);
    let opts = FormatOptions::new(2, false).unwrap();
    let layout = Layout::compute(&d, &opts).unwrap();
    assert!(layout.passes() >= 1);
    // A pass on the converged layout sees every array at its final size.
    let mut again = layout.clone();
    again.refine(&d, &opts).unwrap();
    for rank in 0..layout.order().len() {
        assert!(again.array_placement(rank).size <= layout.array_placement(rank).size);
    }
}

#[test]
fn node_sizes_never_grow_across_passes() {
    let d = random_dictionary(43, 2000);
    for opts in options() {
        let layout = Layout::compute(&d, &opts).unwrap();
        let mut again = layout.clone();
        again.refine(&d, &opts).unwrap();
        for &array in layout.order() {
            for &id in d.array(array).nodes() {
                let before = layout.node_placement(id).size;
                let after = again.node_placement(id).size;
                assert!(after <= before, "node {id:?} grew from {before} to {after}");
            }
        }
    }
}

#[test]
fn body_length_matches_the_layout() {
    let d = random_dictionary(7, 400);
    for opts in options().into_iter().filter(|o| o.version < 4) {
        let layout = Layout::compute(&d, &opts).unwrap();
        let bytes = encode(&d, &opts).unwrap();
        let header = read_header(&bytes).unwrap();
        assert_eq!(bytes.len() - header.header_size, layout.total_size());
    }
}
