use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xxhash_rust::xxh3::xxh3_64;

use slib_core::detect::{detect_with, is_lib_archive_with, is_lib_file_with};
use slib_core::format::NAME_MAX_LEN;
use slib_core::reader::stored_offset;
use slib_core::{Archive, DetectOptions, Entry, ProgressSink, Reader, Writer};
use slib_types::detector_by_name;

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "slib",
    about = "Detect, list, extract, create and repack Shadowcaster LIB archives",
    version
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a file looks like a LIB archive
    Detect {
        /// File to check
        file: PathBuf,
        /// Load the whole file and use the in-memory check instead of the
        /// file check
        #[arg(long)]
        buffer: bool,
        /// Override the minimum length of the first entry's name
        #[arg(long)]
        min_name_len: Option<usize>,
    },
    /// Print the directory of a LIB archive
    List {
        /// LIB archive to list
        file: PathBuf,
        /// Print an xxh3-64 hash of each payload
        #[arg(long)]
        hash: bool,
        /// Entry type detector: none | magic
        #[arg(short, long, default_value = "magic")]
        detector: String,
    },
    /// Write entry payloads out as individual files
    Extract {
        /// LIB archive to extract
        file: PathBuf,
        /// Destination directory (created if missing)
        outdir: PathBuf,
        /// Only extract the entry with this name
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Build a new LIB archive from files
    Create {
        /// Files to add, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Destination LIB archive
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Parse an archive and write it back out, compacting the payload region
    Repack {
        /// Source LIB archive
        input: PathBuf,
        /// Destination LIB archive
        output: PathBuf,
        /// Leave entry states untouched (export a copy)
        #[arg(long)]
        no_update: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

/// Logs open progress phases at debug level.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn set_message(&mut self, message: &str) {
        if !message.is_empty() {
            tracing::debug!("{}", message);
        }
    }

    fn set_progress(&mut self, fraction: f32) {
        tracing::trace!("progress {:.0}%", fraction * 100.0);
    }
}

fn open_archive(path: &Path, detector: &str) -> anyhow::Result<Archive> {
    let detector = detector_by_name(detector)?;
    let mut archive = Archive::new();
    Reader::new(detector.as_ref())
        .with_progress(LogProgress)
        .open_file(&mut archive, path)
        .with_context(|| format!("opening LIB archive {:?}", path))?;
    Ok(archive)
}

/// Entry name for a file added with `create`: upper-cased file name, cut to
/// what the directory can store.
fn entry_name_for(path: &Path) -> anyhow::Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{:?} has no usable file name", path))?
        .to_ascii_uppercase();
    if name.len() > NAME_MAX_LEN {
        tracing::warn!("name {} truncated to {} bytes", name, NAME_MAX_LEN);
    }
    Ok(name)
}

/// Entry names come from untrusted input; never let one pick a directory.
fn is_safe_output_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && name != "." && name != ".."
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_detect(file: PathBuf, buffer: bool, min_name_len: Option<usize>) -> anyhow::Result<()> {
    let mut opts = if buffer {
        DetectOptions::buffer()
    } else {
        DetectOptions::file()
    };
    if let Some(n) = min_name_len {
        opts.min_name_len = n;
    }

    let is_lib = if buffer {
        let data = fs::read(&file).with_context(|| format!("reading {:?}", file))?;
        is_lib_archive_with(&data, opts)
    } else {
        is_lib_file_with(&file, opts)
    };

    println!(
        "{:?}: {}",
        file,
        if is_lib { "LIB archive" } else { "not a LIB archive" }
    );
    if !is_lib {
        std::process::exit(1);
    }
    Ok(())
}

fn run_list(file: PathBuf, show_hash: bool, detector: &str) -> anyhow::Result<()> {
    let archive = open_archive(&file, detector)?;
    let file_size = fs::metadata(&file)?.len();
    let payload: u64 = archive.entries().iter().map(|e| e.size() as u64).sum();

    println!("=== LIB archive: {:?} ===", file);
    println!();
    println!("  entries        : {}", archive.len());
    println!("  payload        : {}", human_bytes(payload));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!();
    println!(
        "  {:>5}  {:<12}  {:>10}  {:>10}  {:<8}{}",
        "index",
        "name",
        "offset",
        "size",
        "type",
        if show_hash { "  xxh3" } else { "" }
    );
    println!("  {}", "-".repeat(if show_hash { 72 } else { 54 }));
    for (i, e) in archive.entries().iter().enumerate() {
        let hash = if show_hash {
            format!("  {:016x}", xxh3_64(e.data().unwrap_or_default()))
        } else {
            String::new()
        };
        println!(
            "  {:>5}  {:<12}  {:>10}  {:>10}  {:<8}{}",
            i,
            e.name(),
            stored_offset(e).map_or_else(|| "-".to_string(), |o| o.to_string()),
            e.size(),
            e.kind().unwrap_or("-"),
            hash
        );
    }
    Ok(())
}

fn run_extract(file: PathBuf, outdir: PathBuf, only: Option<String>) -> anyhow::Result<()> {
    let archive = open_archive(&file, "none")?;
    fs::create_dir_all(&outdir).with_context(|| format!("creating {:?}", outdir))?;

    let t0 = Instant::now();
    let mut written = 0usize;
    let mut bytes = 0u64;
    for e in archive.entries() {
        if only.as_deref().is_some_and(|n| n != e.name()) {
            continue;
        }
        if !is_safe_output_name(e.name()) {
            tracing::warn!("skipping entry with unsafe name {:?}", e.name());
            continue;
        }
        let dest = outdir.join(e.name());
        fs::write(&dest, e.data().unwrap_or_default())
            .with_context(|| format!("writing {:?}", dest))?;
        written += 1;
        bytes += e.size() as u64;
    }

    if let Some(name) = only {
        if written == 0 {
            anyhow::bail!("no entry named '{}' in {:?}", name, file);
        }
    }

    eprintln!("  extracted   : {} entries", written);
    eprintln!("  bytes       : {}", human_bytes(bytes));
    eprintln!("  elapsed     : {:.3}s", t0.elapsed().as_secs_f64());
    Ok(())
}

fn run_create(inputs: Vec<PathBuf>, output: PathBuf) -> anyhow::Result<()> {
    let mut archive = Archive::new();
    for path in &inputs {
        let data = fs::read(path).with_context(|| format!("reading input file {:?}", path))?;
        if u32::try_from(data.len()).is_err() {
            anyhow::bail!("{:?} is too large for a LIB entry", path);
        }
        archive.add_entry(Entry::with_data(entry_name_for(path)?, data));
    }

    Writer::new()
        .write_file(&mut archive, &output)
        .with_context(|| format!("writing LIB archive {:?}", output))?;

    let size = fs::metadata(&output)?.len();
    eprintln!("  entries     : {}", archive.len());
    eprintln!("  archive     : {}", human_bytes(size));
    Ok(())
}

fn run_repack(input: PathBuf, output: PathBuf, no_update: bool) -> anyhow::Result<()> {
    let mut archive = open_archive(&input, "none")?;
    let before = fs::metadata(&input)?.len();

    Writer::new()
        .update(!no_update)
        .write_file(&mut archive, &output)
        .with_context(|| format!("writing LIB archive {:?}", output))?;

    // Sanity check the result with the same heuristic a loader would use.
    let mut f = fs::File::open(&output)?;
    let after = f.metadata()?.len();
    if !archive.is_empty() && !detect_with(&mut f, after, DetectOptions::file()) {
        tracing::warn!("{:?} does not pass LIB detection (first entry name?)", output);
    }

    eprintln!("  entries     : {}", archive.len());
    eprintln!("  before      : {}", human_bytes(before));
    eprintln!("  after       : {}", human_bytes(after));
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Detect {
            file,
            buffer,
            min_name_len,
        } => run_detect(file, buffer, min_name_len),
        Commands::List {
            file,
            hash,
            detector,
        } => run_list(file, hash, &detector),
        Commands::Extract { file, outdir, name } => run_extract(file, outdir, name),
        Commands::Create { inputs, output } => run_create(inputs, output),
        Commands::Repack {
            input,
            output,
            no_update,
        } => run_repack(input, output, no_update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_cannot_name_a_directory() {
        assert!(is_safe_output_name("WALLS.IMG"));
        assert!(is_safe_output_name("..A"));
        for name in ["", ".", "..", "A/B", "..\\X"] {
            assert!(!is_safe_output_name(name), "{name:?}");
        }
    }

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
    }
}
