use honggfuzz::fuzz;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            let _ = lexdict::decode(data);
            let _ = lexdict::read_unigrams_and_bigrams(data);
            let _ = lexdict::lookup(data, "the");
            let mut buf = data.to_vec();
            let _ = lexdict::delete_word(&mut buf, "a");
        });
    }
}
