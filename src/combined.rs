//! Line-oriented "combined" text format.
//!
//! ```text
//! dictionary=main:en,locale=en,version=12
//!  word=hello,f=200
//!   shortcut=hi,f=whitelist
//!   bigram=world,f=180
//!  word=damn,f=0,not_a_word=true,blacklisted=true
//! ```
//!
//! Lines starting with `#` are comments. Attribute lines belong to the word
//! line above them.

use std::io::{BufRead, Write};

use crate::config::DictionaryOptions;
use crate::dictionary::{Dictionary, Entry, WeightedString};
use crate::error::{DictError, Result};
use crate::format::{DICTIONARY_ID_KEY, SHORTCUT_WHITELIST_FREQUENCY};
use crate::word::Word;

const WORD_TAG: &str = "word";
const FREQUENCY_TAG: &str = "f";
const SHORTCUT_TAG: &str = "shortcut";
const BIGRAM_TAG: &str = "bigram";
const NOT_A_WORD_TAG: &str = "not_a_word";
const BLACKLISTED_TAG: &str = "blacklisted";
const OPTIONS_TAG: &str = "options";
const WHITELIST: &str = "whitelist";
const GERMAN_UMLAUT: &str = "german_umlaut_processing";
const FRENCH_LIGATURE: &str = "french_ligature_processing";
const COMMENT: char = '#';

/// Whether the first non-comment line looks like a combined header.
pub fn is_combined(text: &str) -> bool {
    text.lines()
        .find(|l| !l.starts_with(COMMENT) && !l.trim().is_empty())
        .is_some_and(|l| l.starts_with(&format!("{DICTIONARY_ID_KEY}=")) && l.contains(','))
}

#[derive(Default)]
struct PendingWord {
    word: String,
    frequency: u32,
    not_a_word: bool,
    blacklisted: bool,
    shortcuts: Vec<WeightedString>,
    bigrams: Vec<WeightedString>,
}

fn malformed(line_no: usize, line: &str) -> DictError {
    DictError::InvalidInput(format!("line {line_no}: cannot parse \"{}\"", line.trim()))
}

fn parse_number(value: &str, line_no: usize, line: &str) -> Result<u32> {
    value.parse().map_err(|_| malformed(line_no, line))
}

fn parse_header(line: &str) -> Result<DictionaryOptions> {
    let mut options = DictionaryOptions::default();
    for item in line.trim().split(',') {
        let (key, value) = item.split_once('=').ok_or_else(|| malformed(1, line))?;
        if key == OPTIONS_TAG {
            for flag in value.split(':') {
                match flag {
                    GERMAN_UMLAUT => options.german_umlaut_processing = true,
                    FRENCH_LIGATURE => options.french_ligature_processing = true,
                    _ => {}
                }
            }
        } else {
            options.attributes.insert(key.to_string(), value.to_string());
        }
    }
    Ok(options)
}

/// Key/value pairs of one line, `tag=value` first.
fn fields(line: &str) -> impl Iterator<Item = Option<(&str, &str)>> {
    line.trim().split(',').map(|p| p.split_once('='))
}

/// Parse a combined file into a dictionary. Bigrams are registered after
/// every word is in, so forward references work.
pub fn read<R: BufRead>(reader: R) -> Result<Dictionary> {
    let mut lines = reader
        .lines()
        .enumerate()
        .filter(|(_, l)| !matches!(l, Ok(l) if l.starts_with(COMMENT) || l.trim().is_empty()));
    let header = match lines.next() {
        Some((_, line)) => line?,
        None => return Err(DictError::InvalidInput("combined file has no header line".into())),
    };
    let mut dict = Dictionary::new(parse_header(&header)?);

    let mut words: Vec<PendingWord> = Vec::new();
    for (index, line) in lines {
        let line = line?;
        let line_no = index + 1;
        let mut params = fields(&line);
        let Some(Some((tag, value))) = params.next() else {
            return Err(malformed(line_no, &line));
        };
        match tag {
            WORD_TAG => {
                let mut word = PendingWord {
                    word: value.to_string(),
                    ..PendingWord::default()
                };
                for param in params {
                    let (key, value) = param.ok_or_else(|| malformed(line_no, &line))?;
                    match key {
                        FREQUENCY_TAG => word.frequency = parse_number(value, line_no, &line)?,
                        NOT_A_WORD_TAG => word.not_a_word = value == "true",
                        BLACKLISTED_TAG => word.blacklisted = value == "true",
                        _ => {}
                    }
                }
                words.push(word);
            }
            SHORTCUT_TAG | BIGRAM_TAG => {
                let Some(current) = words.last_mut() else {
                    return Err(malformed(line_no, &line));
                };
                let mut frequency = 0;
                for param in params {
                    let (key, value) = param.ok_or_else(|| malformed(line_no, &line))?;
                    if key == FREQUENCY_TAG {
                        frequency = if tag == SHORTCUT_TAG && value == WHITELIST {
                            SHORTCUT_WHITELIST_FREQUENCY
                        } else {
                            parse_number(value, line_no, &line)?
                        };
                    }
                }
                let target = WeightedString::new(value, frequency);
                if tag == SHORTCUT_TAG {
                    current.shortcuts.push(target);
                } else {
                    current.bigrams.push(target);
                }
            }
            _ => return Err(malformed(line_no, &line)),
        }
    }

    for w in &words {
        dict.insert(
            &w.word,
            Entry {
                frequency: w.frequency,
                shortcuts: &w.shortcuts,
                bigrams: &[],
                not_a_word: w.not_a_word,
                blacklisted: w.blacklisted,
            },
        )?;
    }
    for w in &words {
        for b in &w.bigrams {
            dict.set_bigram(&w.word, &b.word, b.frequency)?;
        }
    }
    Ok(dict)
}

fn write_word<W: Write>(out: &mut W, word: &Word) -> Result<()> {
    write!(out, " {WORD_TAG}={},{FREQUENCY_TAG}={}", word.word, word.frequency)?;
    if word.not_a_word {
        write!(out, ",{NOT_A_WORD_TAG}=true")?;
    }
    if word.blacklisted {
        write!(out, ",{BLACKLISTED_TAG}=true")?;
    }
    writeln!(out)?;
    for s in &word.shortcuts {
        if s.frequency == SHORTCUT_WHITELIST_FREQUENCY {
            writeln!(out, "  {SHORTCUT_TAG}={},{FREQUENCY_TAG}={WHITELIST}", s.word)?;
        } else {
            writeln!(out, "  {SHORTCUT_TAG}={},{FREQUENCY_TAG}={}", s.word, s.frequency)?;
        }
    }
    for b in &word.bigrams {
        writeln!(out, "  {BIGRAM_TAG}={},{FREQUENCY_TAG}={}", b.word, b.frequency)?;
    }
    Ok(())
}

/// Write `dict` as combined text, most frequent words first.
pub fn write<W: Write>(dict: &Dictionary, mut out: W) -> Result<()> {
    let header: Vec<String> = dict
        .options
        .attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    write!(out, "{}", header.join(","))?;
    let mut flags = Vec::new();
    if dict.options.german_umlaut_processing {
        flags.push(GERMAN_UMLAUT);
    }
    if dict.options.french_ligature_processing {
        flags.push(FRENCH_LIGATURE);
    }
    if !flags.is_empty() {
        write!(out, ",{OPTIONS_TAG}={}", flags.join(":"))?;
    }
    writeln!(out)?;

    let mut words: Vec<Word> = dict.words().collect();
    words.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.word.cmp(&b.word)));
    for word in &words {
        write_word(&mut out, word)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# sample
dictionary=main:en,locale=en,options=german_umlaut_processing
 word=hello,f=200
  shortcut=hi,f=whitelist
  bigram=world,f=220
 word=world,f=180
 word=damn,f=0,not_a_word=true,blacklisted=true
";

    #[test]
    fn reads_words_and_attributes() {
        assert!(is_combined(SAMPLE));
        let d = read(SAMPLE.as_bytes()).unwrap();
        assert_eq!(d.options.dictionary_id(), Some("main:en"));
        assert!(d.options.german_umlaut_processing);
        assert_eq!(d.frequency_of("hello"), Some(200));
        let hello = d.node(d.find_word("hello").unwrap());
        assert_eq!(hello.shortcuts(), &[WeightedString::new("hi", 15)]);
        assert_eq!(hello.bigrams(), &[WeightedString::new("world", 220)]);
        let damn = d.node(d.find_word("damn").unwrap());
        assert!(damn.is_not_a_word() && damn.is_blacklisted());
    }

    #[test]
    fn write_then_read_keeps_words() {
        let d = read(SAMPLE.as_bytes()).unwrap();
        let mut text = Vec::new();
        write(&d, &mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.starts_with("dictionary=main:en,locale=en,options=german_umlaut_processing\n"));
        assert!(text.contains("\n word=hello,f=200\n  shortcut=hi,f=whitelist\n  bigram=world,f=220\n"));
        let back = read(text.as_bytes()).unwrap();
        assert!(crate::word::same_words(&d, &back));
    }

    /// Accepts everything, then fails on flush like a full disk would.
    struct FailingFlush(Vec<u8>);

    impl Write for FailingFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::WriteZero, "no space left"))
        }
    }

    #[test]
    fn flush_errors_are_reported() {
        let d = read(SAMPLE.as_bytes()).unwrap();
        let err = write(&d, FailingFlush(Vec::new())).unwrap_err();
        assert!(matches!(err, DictError::Io(e) if e.kind() == std::io::ErrorKind::WriteZero));
        let err = write(&d, std::io::BufWriter::new(FailingFlush(Vec::new()))).unwrap_err();
        assert!(matches!(err, DictError::Io(_)));
    }

    #[test]
    fn bigram_target_may_come_later() {
        let text = "dictionary=x,locale=en\n word=a,f=1\n  bigram=zebra,f=5\n";
        let d = read(text.as_bytes()).unwrap();
        assert_eq!(d.frequency_of("zebra"), Some(0));
    }

    #[test]
    fn rejects_orphan_attribute_lines() {
        let text = "dictionary=x,locale=en\n  shortcut=hi,f=3\n";
        assert!(matches!(read(text.as_bytes()), Err(DictError::InvalidInput(_))));
        assert!(read("".as_bytes()).is_err());
        assert!(read("dictionary=x,locale=en\n word=a,f=many\n".as_bytes()).is_err());
    }
}
