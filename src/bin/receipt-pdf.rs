//! Receipt PDF CLI tool
//!
//! A command-line tool for combining a folder of receipts into one PDF.

use std::io;
use std::path::{Path, PathBuf};
use std::process;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use receipt_pdf::pdf::extract_metadata;
use receipt_pdf::progress::{BuildProgressCallback, NoopProgressCallback};
use receipt_pdf::receipts::{
    build_receipts_pdf, plan, BuildOptions, DEFAULT_CONVERTED_DIR, DEFAULT_IMAGE_WIDTH,
    DEFAULT_OUTPUT_NAME,
};

/// Receipt PDF - Combine a folder of receipts into one PDF
#[derive(Parser)]
#[command(name = "receipt-pdf")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Combine everything in a folder into MyReceipts.pdf
    receipt-pdf build ~/Receipts/2024-03

    # Skip scans of drafts and open the result
    receipt-pdf build ~/Receipts/2024-03 --exclude \"draft-*\" --open

    # Japanese file names in the titles
    receipt-pdf build ~/Receipts/2024-03 --font ~/Fonts/NotoSansJP-Regular.ttf

    # See what would be included
    receipt-pdf list ~/Receipts/2024-03")]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine the receipts in a folder into one PDF
    Build {
        /// Folder of receipt images and PDFs
        folder: PathBuf,

        /// Output file name, written inside the folder
        #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
        output_name: String,

        /// Subfolder for JPEGs converted from HEIC
        #[arg(long, default_value = DEFAULT_CONVERTED_DIR)]
        converted_dir: String,

        /// Width of each receipt on the page, in points
        #[arg(long, default_value_t = DEFAULT_IMAGE_WIDTH, value_parser = parse_width)]
        image_width: f32,

        /// File name glob to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Document title stored in the PDF metadata
        #[arg(long, default_value = "My Receipts")]
        title: String,

        /// TrueType font for file-name titles (e.g. NotoSansJP.ttf)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Leave out the "--Page X of Y--" footer
        #[arg(long)]
        no_page_numbers: bool,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },

    /// List the files a build would include, in order
    List {
        /// Folder of receipt images and PDFs
        folder: PathBuf,

        /// Output file name to skip
        #[arg(long, default_value = DEFAULT_OUTPUT_NAME)]
        output_name: String,

        /// File name glob to leave out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Show information about a PDF file
    Info {
        /// PDF file to inspect
        input: PathBuf,
    },
}

/// Prints one line per receipt as the build runs
struct CliProgress;

impl BuildProgressCallback for CliProgress {
    fn on_build_start(&self, total_files: usize) {
        eprintln!("Combining {} receipt file(s)...", total_files);
    }

    fn on_file_start(&self, index: usize, total_files: usize, name: &str) {
        eprintln!("  [{}/{}] {}", index, total_files, name);
    }

    fn on_file_converted(&self, _source: &Path, converted: &Path) {
        eprintln!("        converted to {}", converted.display());
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build {
            folder, output_name, converted_dir, image_width, exclude, title,
            font, no_page_numbers, open,
        } => {
            let options = BuildOptions {
                folder,
                output_name,
                converted_dir,
                image_width,
                exclude,
                title,
                page_numbers: !no_page_numbers,
                font,
            };
            cmd_build(options, open, cli.quiet)
        }
        Commands::List { folder, output_name, exclude } => {
            let options = BuildOptions {
                folder,
                output_name,
                exclude,
                ..Default::default()
            };
            cmd_list(options)
        }
        Commands::Info { input } => {
            cmd_info(input)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Parse a strictly positive, finite width in points
fn parse_width(value: &str) -> std::result::Result<f32, String> {
    let width: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if !width.is_finite() || width <= 0.0 {
        return Err(format!("width must be greater than 0, got {}", value));
    }
    Ok(width)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(path)
            .spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Build the combined receipts PDF
fn cmd_build(options: BuildOptions, open: bool, quiet: bool) -> Result<()> {
    let progress: &dyn BuildProgressCallback = if quiet {
        &NoopProgressCallback
    } else {
        &CliProgress
    };
    let report = build_receipts_pdf(&options, progress)
        .with_context(|| format!("Failed to build receipts PDF from {}", options.folder.display()))?;

    if !quiet {
        eprintln!(
            "Wrote {} ({} pages from {} files)",
            report.output_path.display(),
            report.page_count,
            report.files.len()
        );
    }

    if open {
        open_file(&report.output_path)
            .with_context(|| format!("Failed to open {}", report.output_path.display()))?;
    }

    Ok(())
}

/// Print the files a build would include
fn cmd_list(options: BuildOptions) -> Result<()> {
    let files = plan(&options)
        .with_context(|| format!("Failed to scan {}", options.folder.display()))?;

    for file in &files {
        println!("{:<6} {}", file.kind.label(), file.name);
    }
    println!("{} file(s)", files.len());

    Ok(())
}

/// Show information about a PDF
fn cmd_info(input: PathBuf) -> Result<()> {
    let metadata = extract_metadata(&input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("File: {}", input.display());
    println!("Pages: {}", metadata.page_count);
    if let Some(declared) = metadata.declared_page_count {
        if declared != metadata.page_count {
            println!(
                "  (declares {} pages; {} are reachable and would be imported)",
                declared, metadata.page_count
            );
        }
    }

    if let Some(title) = metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = metadata.author {
        println!("Author: {}", author);
    }
    if let Some(producer) = metadata.producer {
        println!("Producer: {}", producer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_width() {
        assert_eq!(parse_width("400"), Ok(400.0));
        assert_eq!(parse_width("12.5"), Ok(12.5));
        assert!(parse_width("0").is_err());
        assert!(parse_width("-10").is_err());
        assert!(parse_width("NaN").is_err());
        assert!(parse_width("inf").is_err());
        assert!(parse_width("wide").is_err());
    }
}
