use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::info;

use lexdict::{
    combined,
    compress::Layout,
    container::{self, Encoded},
    decoder,
    io_utils::{dict_cli_error, io_cli_error, simple_cli_error, CliError},
    stats::LayoutStats,
    updater, word, Dictionary, Entry, FormatOptions, WeightedString,
};

/// Build, inspect and edit binary word-prediction dictionaries.
#[derive(Parser)]
#[command(name = "lexdict", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build a binary dictionary from a combined text file or another binary.
    Makedict {
        input: PathBuf,
        /// Output file, or directory for version 4
        output: PathBuf,
        #[arg(long, default_value_t = 2)]
        version: u16,
        /// Reserve room for in-place updates (version 3 and up)
        #[arg(long)]
        dynamic: bool,
        /// Another dictionary whose words are merged in, repeatable
        #[arg(long = "merge")]
        merge: Vec<PathBuf>,
    },
    /// Print a dictionary in combined text format.
    Dump {
        dict: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Show header attributes and layout statistics.
    Info {
        dict: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Add or replace a word in a dynamic dictionary.
    Insert {
        dict: PathBuf,
        word: String,
        #[arg(long)]
        freq: u32,
        /// Bigram successor as WORD:FREQ, repeatable
        #[arg(long = "bigram", value_parser = parse_weighted)]
        bigrams: Vec<WeightedString>,
        /// Shortcut target as WORD:FREQ, repeatable
        #[arg(long = "shortcut", value_parser = parse_weighted)]
        shortcuts: Vec<WeightedString>,
        #[arg(long)]
        not_a_word: bool,
        #[arg(long)]
        blacklisted: bool,
    },
    /// Mark a word deleted in a dynamic dictionary.
    Delete { dict: PathBuf, word: String },
    /// Decode the whole dictionary and verify its structure.
    Check { dict: PathBuf },
}

fn parse_weighted(s: &str) -> Result<WeightedString, String> {
    let (word, frequency) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected WORD:FREQ, got \"{s}\""))?;
    let frequency = frequency
        .parse()
        .map_err(|_| format!("\"{frequency}\" is not a frequency"))?;
    Ok(WeightedString::new(word, frequency))
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Makedict {
            input,
            output,
            version,
            dynamic,
            merge,
        } => makedict(&input, &merge, &output, version, dynamic)?,
        Command::Dump { dict, output } => dump(&dict, output.as_deref())?,
        Command::Info { dict, json } => show_info(&dict, json)?,
        Command::Insert {
            dict,
            word,
            freq,
            bigrams,
            shortcuts,
            not_a_word,
            blacklisted,
        } => {
            let entry = Entry {
                frequency: freq,
                shortcuts: &shortcuts,
                bigrams: &bigrams,
                not_a_word,
                blacklisted,
            };
            edit(&dict, |buf| updater::insert_word(buf, &word, entry))?;
        }
        Command::Delete { dict, word } => {
            let mut found = false;
            edit(&dict, |buf| {
                found = updater::delete_word(buf, &word)?;
                Ok(())
            })?;
            if !found {
                return Err(simple_cli_error(&format!("\"{word}\" is not in the dictionary")).into());
            }
        }
        Command::Check { dict } => check(&dict)?,
    }
    Ok(())
}

/// Name of the files inside a version 4 directory.
fn split_name(dir: &Path) -> Result<String, CliError> {
    dir.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| simple_cli_error(&format!("'{}' has no usable name", dir.display())))
}

/// Load a dictionary from a split directory, a binary blob or combined text.
fn load(path: &Path) -> Result<Dictionary, CliError> {
    if path.is_dir() {
        let name = split_name(path)?;
        return container::load_dir(path, &name).map_err(|e| dict_cli_error("reading dictionary", e));
    }
    let data = fs::read(path).map_err(|e| io_cli_error("reading", path, e))?;
    if lexdict::is_valid_format(&data) {
        return lexdict::decode(&data).map_err(|e| dict_cli_error("decoding dictionary", e));
    }
    let text = std::str::from_utf8(&data)
        .ok()
        .filter(|text| combined::is_combined(text))
        .ok_or_else(|| {
            simple_cli_error(&format!(
                "'{}' is neither a binary dictionary nor a combined word list",
                path.display()
            ))
        })?;
    combined::read(text.as_bytes()).map_err(|e| dict_cli_error("reading combined file", e))
}

fn makedict(
    input: &Path,
    merge: &[PathBuf],
    output: &Path,
    version: u16,
    dynamic: bool,
) -> Result<(), CliError> {
    let mut dict = load(input)?;
    for extra in merge {
        let other = load(extra)?;
        word::merge_into(&mut dict, &other).map_err(|e| dict_cli_error("merging", e))?;
    }
    let options =
        FormatOptions::new(version, dynamic).map_err(|e| dict_cli_error("format options", e))?;
    info!(
        "{} nodes in {} arrays",
        dict.count_nodes(),
        dict.count_node_arrays()
    );
    match container::encode(&dict, &options).map_err(|e| dict_cli_error("encoding", e))? {
        Encoded::Blob(bytes) => {
            fs::write(output, bytes).map_err(|e| io_cli_error("writing", output, e))?
        }
        Encoded::Split(split) => {
            let name = split_name(output)?;
            container::write_dir(&split, output, &name)
                .map_err(|e| dict_cli_error("writing dictionary", e))?
        }
    }
    Ok(())
}

fn dump(path: &Path, output: Option<&Path>) -> Result<(), CliError> {
    let dict = load(path)?;
    let result = match output {
        Some(out) => {
            let file = fs::File::create(out).map_err(|e| io_cli_error("creating", out, e))?;
            combined::write(&dict, BufWriter::new(file))
        }
        None => combined::write(&dict, BufWriter::new(io::stdout().lock())),
    };
    result.map_err(|e| dict_cli_error("writing combined text", e))
}

fn show_info(path: &Path, json: bool) -> Result<(), CliError> {
    let header = if path.is_dir() {
        let name = split_name(path)?;
        let split = container::read_dir(path, &name)
            .map_err(|e| dict_cli_error("reading dictionary", e))?;
        lexdict::read_header(&split.trie)
    } else {
        let data = fs::read(path).map_err(|e| io_cli_error("reading", path, e))?;
        lexdict::read_header(&data)
    };
    let header = header.map_err(|e| dict_cli_error("reading header", e))?;
    let dict = load(path)?;
    let layout = Layout::compute(&dict, &header.format_options)
        .map_err(|e| dict_cli_error("computing layout", e))?;
    let stats = LayoutStats::new(&dict, &layout);
    let words = dict.words().count();

    if json {
        let out = serde_json::json!({
            "version": header.format_options.version,
            "dynamic": header.format_options.supports_dynamic_update,
            "header_size": header.header_size,
            "options": header.dictionary_options,
            "words": words,
            "layout": stats,
        });
        let text = serde_json::to_string_pretty(&out)
            .map_err(|e| simple_cli_error(&format!("formatting json: {e}")))?;
        println!("{text}");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    let write = |out: &mut io::StdoutLock<'_>| -> io::Result<()> {
        writeln!(out, "version: {}", header.format_options.version)?;
        writeln!(out, "dynamic: {}", header.format_options.supports_dynamic_update)?;
        for (k, v) in &header.dictionary_options.attributes {
            writeln!(out, "{k}: {v}")?;
        }
        writeln!(out, "words: {words}")?;
        writeln!(out, "nodes: {} in {} arrays", stats.nodes, stats.node_arrays)?;
        writeln!(out, "body: {} bytes", stats.body_size)
    };
    write(&mut out).map_err(|e| simple_cli_error(&format!("writing to stdout: {e}")))
}

/// Apply an in-place update to a blob and write it back.
fn edit<F>(path: &Path, update: F) -> Result<(), CliError>
where
    F: FnOnce(&mut Vec<u8>) -> lexdict::Result<()>,
{
    let mut data = fs::read(path).map_err(|e| io_cli_error("reading", path, e))?;
    update(&mut data).map_err(|e| dict_cli_error("updating dictionary", e))?;
    fs::write(path, &data).map_err(|e| io_cli_error("writing", path, e))
}

fn check(path: &Path) -> Result<(), CliError> {
    if !path.is_dir() {
        let valid = decoder::is_valid_file(path).map_err(|e| dict_cli_error("checking", e))?;
        if !valid {
            return Err(simple_cli_error(&format!(
                "'{}' is not a binary dictionary",
                path.display()
            )));
        }
    }
    let dict = load(path)?;
    if !dict.check_ordering() {
        return Err(simple_cli_error("node arrays are out of order"));
    }
    println!("ok: {} words", dict.words().count());
    Ok(())
}
