use lexdict::buffer::ByteReader;
use lexdict::char_codec::{char_size, read_char, read_string, write_char, write_string};
use quickcheck::quickcheck;

quickcheck! {
    fn char_roundtrip(c: char) -> bool {
        let code_point = c as u32;
        let mut out = Vec::new();
        write_char(&mut out, code_point);
        let mut reader = ByteReader::new(&out);
        out.len() == char_size(code_point)
            && read_char(&mut reader).ok() == Some(Some(code_point))
            && reader.position() == out.len()
    }

    fn one_byte_range_only(c: char) -> bool {
        let code_point = c as u32;
        let expected = if (0x20..=0xFF).contains(&code_point) { 1 } else { 3 };
        char_size(code_point) == expected
    }

    fn string_roundtrip(s: String) -> bool {
        let mut out = Vec::new();
        write_string(&mut out, &s);
        read_string(&mut ByteReader::new(&out)).ok() == Some(s)
    }
}

#[test]
fn terminator_ends_a_string() {
    let mut reader = ByteReader::new(&[b'h', b'i', 0x1F, b'x']);
    assert_eq!(read_string(&mut reader).unwrap(), "hi");
    assert_eq!(reader.position(), 3);
}
