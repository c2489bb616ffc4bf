use lexdict::{
    bigram, char_codec, container, decode, encode, format, read_header, Dictionary,
    DictionaryOptions, FormatOptions,
};

fn dict() -> Dictionary {
    Dictionary::new(DictionaryOptions::new("scenario", "en_US"))
}

fn text(d: &Dictionary, id: lexdict::dictionary::NodeId) -> String {
    char_codec::code_points_to_string(d.node(id).chars()).unwrap()
}

fn assert_cat_car_cart(d: &Dictionary) {
    let root = d.array(d.root()).nodes();
    assert_eq!(root.len(), 1);
    let ca = d.node(root[0]);
    assert_eq!(text(d, root[0]), "ca");
    assert!(!ca.is_terminal());

    let children = d.array(ca.children().unwrap()).nodes();
    assert_eq!(children.len(), 2);
    assert_eq!(text(d, children[0]), "r");
    assert_eq!(d.node(children[0]).frequency(), Some(150));
    assert_eq!(text(d, children[1]), "t");
    assert_eq!(d.node(children[1]).frequency(), Some(200));
    assert!(d.node(children[1]).children().is_none());

    let r_children = d.array(d.node(children[0]).children().unwrap()).nodes();
    assert_eq!(r_children.len(), 1);
    assert_eq!(text(d, r_children[0]), "t");
    assert_eq!(d.node(r_children[0]).frequency(), Some(100));
}

#[test]
fn cat_car_cart_share_the_ca_prefix() {
    let mut d = dict();
    d.add("cat", 200, &[], false).unwrap();
    d.add("car", 150, &[], false).unwrap();
    d.add("cart", 100, &[], false).unwrap();
    assert_cat_car_cart(&d);

    for (version, dynamic) in [(2, false), (3, false), (3, true)] {
        let bytes = encode(&d, &FormatOptions::new(version, dynamic).unwrap()).unwrap();
        assert_cat_car_cart(&decode(&bytes).unwrap());
    }
}

#[test]
fn a_and_ab_use_one_byte_children_address() {
    let mut d = dict();
    d.add("a", 1, &[], false).unwrap();
    d.add("ab", 2, &[], false).unwrap();
    let bytes = encode(&d, &FormatOptions::new(2, false).unwrap()).unwrap();
    let header = read_header(&bytes).unwrap();
    let body = &bytes[header.header_size..];
    assert_eq!(body[0], 1);
    assert_eq!(
        body[1] & format::MASK_CHILDREN_ADDRESS_TYPE,
        format::FLAG_CHILDREN_ADDRESS_TYPE_ONEBYTE
    );

    let back = decode(&bytes).unwrap();
    assert_eq!(back.frequency_of("a"), Some(1));
    assert_eq!(back.frequency_of("ab"), Some(2));
    assert_eq!(back.words().count(), 2);
}

#[test]
fn the_quick_bigram_reconstructs_within_a_step() {
    let nibble = bigram::quantize(200, 210, "quick");
    assert!(nibble <= 15);
    let step = (255.0 - 200.0) / 16.5;
    let back = bigram::reconstruct(200, nibble) as f32;
    assert!((back - 210.0).abs() <= step + 1.0, "reconstructed {back}");

    let mut d = dict();
    d.add("the", 180, &[], false).unwrap();
    d.add("quick", 200, &[], false).unwrap();
    d.set_bigram("the", "quick", 210).unwrap();
    let bytes = encode(&d, &FormatOptions::new(2, false).unwrap()).unwrap();
    let back = decode(&bytes).unwrap();
    let the = back.node(back.find_word("the").unwrap());
    assert_eq!(the.bigrams().len(), 1);
    assert_eq!(the.bigrams()[0].word, "quick");
    assert_eq!(the.bigrams()[0].frequency, bigram::reconstruct(200, nibble));
}

fn wide_root() -> Dictionary {
    let mut d = dict();
    for i in 0..200u32 {
        let word = char::from_u32(0x4E00 + i).unwrap().to_string();
        d.add(&word, i % 256, &[], false).unwrap();
    }
    d
}

#[test]
fn more_than_127_siblings_use_a_two_byte_count() {
    let d = wide_root();
    assert_eq!(d.array(d.root()).len(), 200);
    for version in [2, 3] {
        let bytes = encode(&d, &FormatOptions::new(version, false).unwrap()).unwrap();
        let header = read_header(&bytes).unwrap();
        let body = &bytes[header.header_size..];
        assert_eq!(body[0], 0x80);
        assert_eq!(body[1], 200);
        let back = decode(&bytes).unwrap();
        assert_eq!(back.array(back.root()).len(), 200);
        assert!(lexdict::word::same_words(&d, &back));
    }
}

#[test]
fn more_than_127_siblings_in_a_split_container() {
    let d = wide_root();
    let split = container::encode_split(&d, &FormatOptions::new(4, false).unwrap()).unwrap();
    let header = read_header(&split.trie).unwrap();
    assert_eq!(split.trie[header.header_size] & 0x80, 0x80);
    let back = container::decode_split(&split).unwrap();
    assert!(lexdict::word::same_words(&d, &back));
}
