use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use zs2codec::{container, dump, markup, pipeline, tree, DecodeOptions, Level};

#[derive(Parser)]
#[command(name = "zs2", version, about = "Decode and encode zs2 measurement files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Xml,
    Text,
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    Json,
    Xml,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a .zs2 file
    Decode {
        input: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
        /// Interpretation level: 1 tags, 2 array subtypes, 3 records
        #[arg(short, long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=3))]
        level: u8,
        /// Keep undecodable data instead of failing
        #[arg(short, long)]
        debug: bool,
        /// Include chunk addresses in the output
        #[arg(long)]
        with_address: bool,
    },
    /// Encode a JSON or XML tree into a .zs2 file
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Input format (default: from the file extension, else json)
        #[arg(short, long, value_enum)]
        format: Option<InputFormat>,
        /// Write the decompressed stream without gzip framing
        #[arg(long)]
        raw: bool,
    },
    /// Hex dump of the decompressed stream
    Hexdump {
        input: PathBuf,
        #[arg(short, long, default_value = "0")]
        start: usize,
        #[arg(short, long, default_value = "16")]
        rows: usize,
    },
    /// Check that files survive a decode/encode cycle unchanged
    Check {
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    match Cli::parse().command {

        // ── Decode ───────────────────────────────────────────────────────────
        Commands::Decode { input, output, format, level, debug, with_address } => {
            let options = DecodeOptions {
                level: Level::from_number(level).unwrap_or_default(),
                debug,
            };
            let stream = container::read_stream(&input, debug)?;
            let chunks = pipeline::decode_stream(&stream, options)?;
            let text = match format {
                OutputFormat::Json => tree::to_json(&tree::build(&chunks, with_address)?)?,
                OutputFormat::Xml  => markup::to_xml(&chunks, with_address)?,
                OutputFormat::Text => dump::text_dump(&chunks),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    println!("Decoded {} chunks → {}", chunks.len(), path.display());
                }
                None => println!("{text}"),
            }
        }

        // ── Encode ───────────────────────────────────────────────────────────
        Commands::Encode { input, output, format, raw } => {
            let text = std::fs::read_to_string(&input)?;
            let stream = match format.unwrap_or_else(|| input_format(&input)) {
                InputFormat::Json => pipeline::json_to_stream(&text)?,
                InputFormat::Xml  => pipeline::xml_to_stream(&text)?,
            };
            if raw {
                std::fs::write(&output, &stream)?;
            } else {
                container::write_stream(&output, &stream)?;
            }
            println!("Encoded {} bytes → {}", stream.len(), output.display());
            println!("  Fingerprint {}", zs2codec::fingerprint(&stream));
        }

        // ── Hexdump ──────────────────────────────────────────────────────────
        Commands::Hexdump { input, start, rows } => {
            let stream = container::read_stream(&input, true)?;
            println!("{}", dump::hex_dump(&stream, start, rows, 16));
        }

        // ── Check ────────────────────────────────────────────────────────────
        Commands::Check { inputs } => {
            let results = check_all(&inputs);
            let mut failed = 0;
            for (path, result) in inputs.iter().zip(results) {
                match result {
                    Ok(report) if report.is_identical() => {
                        println!("  ok      {}  {}", path.display(), &report.input_fingerprint[..16]);
                    }
                    Ok(report) => {
                        failed += 1;
                        println!("  CHANGED {}  {} → {}", path.display(),
                            &report.input_fingerprint[..16], &report.output_fingerprint[..16]);
                    }
                    Err(e) => {
                        failed += 1;
                        println!("  FAILED  {}  {}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} files failed the conversion cycle", inputs.len()).into());
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn input_format(path: &Path) -> InputFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("xml") => InputFormat::Xml,
        _ => InputFormat::Json,
    }
}

fn check_one(path: &Path) -> zs2codec::Result<pipeline::CycleReport> {
    let stream = container::read_stream(path, false)?;
    pipeline::process_cycle(&stream)
}

#[cfg(feature = "parallel")]
fn check_all(inputs: &[PathBuf]) -> Vec<zs2codec::Result<pipeline::CycleReport>> {
    use rayon::prelude::*;
    inputs.par_iter().map(|p| check_one(p)).collect()
}

#[cfg(not(feature = "parallel"))]
fn check_all(inputs: &[PathBuf]) -> Vec<zs2codec::Result<pipeline::CycleReport>> {
    inputs.iter().map(|p| check_one(p)).collect()
}
