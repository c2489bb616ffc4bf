use clap::Parser;
use std::fs;
use std::path::PathBuf;
use lexdict::{
    bigram,
    io_utils::{dict_cli_error, io_cli_error},
    read_unigrams_and_bigrams,
};

/// List every word of a blob dictionary with its terminal position, without
/// building the trie.
#[derive(Parser)]
struct Args {
    /// Version 2 or 3 dictionary file
    input: PathBuf,
    /// Show bigram successors
    #[arg(long)]
    bigrams: bool,
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let data = fs::read(&args.input).map_err(|e| io_cli_error("reading", &args.input, e))?;
    let flat = read_unigrams_and_bigrams(&data).map_err(|e| dict_cli_error("reading words", e))?;
    for (position, word) in &flat.words {
        let frequency = flat.frequencies.get(position).copied().unwrap_or_default();
        println!("{position:>8} {frequency:>3} {word}");
        if !args.bigrams {
            continue;
        }
        for b in flat.bigrams.get(position).into_iter().flatten() {
            match (flat.words.get(&b.address), flat.frequencies.get(&b.address)) {
                (Some(target), Some(&unigram)) => println!(
                    "           -> {target} {}",
                    bigram::reconstruct(u32::from(unigram), b.frequency)
                ),
                _ => println!("           -> @{} nibble {}", b.address, b.frequency),
            }
        }
    }
    Ok(())
}
