use honggfuzz::fuzz;
use lexdict::{header, FormatOptions};

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            let Ok(parsed) = header::read_header(data) else {
                return;
            };
            let Ok(options) = FormatOptions::new(
                parsed.format_options.version,
                parsed.format_options.supports_dynamic_update,
            ) else {
                return;
            };
            let written =
                header::write_header(&parsed.dictionary_options, &options, parsed.contains_bigrams())
                    .expect("a header that parsed must serialize");
            let again = header::read_header(&written).expect("written header must parse");
            assert_eq!(again.dictionary_options, parsed.dictionary_options);
            assert_eq!(again.format_options, parsed.format_options);
        });
    }
}
