//! wavtags - Print and edit the tags of RIFF (WAV) files
//!
//! Handles RIFF INFO entries and ID3v2.3 text frames embedded in an
//! `id3 ` chunk.

use anyhow::{Context, Result};
use colored::*;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wavtags::{
    collect_tags, edit_file, read_file, EditOptions, Namespace, TagEdit, CHUNK_TYPES,
    FRAME_TYPES,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Options
// =============================================================================

#[derive(Default)]
struct Options {
    // Edit options
    clear: bool,  // -c
    append: bool, // -a

    // Mode options
    list: bool,      // -l
    info: bool,      // -i
    list_tags: bool, // -L
    list_id3: bool,  // -I

    // Output options
    json: bool,    // -j
    verbose: bool, // -v

    // tag=value requests, then files
    edits: Vec<String>,
    files: Vec<PathBuf>,
}

impl Options {
    fn edit_options(&self) -> EditOptions {
        EditOptions {
            clear: self.clear,
            append: self.append,
        }
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(2);
    }

    let opts = parse_args(&args[1..])?;
    init_logging(opts.verbose);
    run(opts)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();

    for arg in args {
        if arg.starts_with('-') && arg.len() > 1 {
            let flag = &arg[1..];

            match flag {
                "h" | "-help" => {
                    print_usage();
                    std::process::exit(0);
                }
                "-version" => {
                    print_version();
                    std::process::exit(0);
                }
                "v" | "-verbose" => opts.verbose = true,
                "c" | "-clear" => opts.clear = true,
                "a" | "-append" => opts.append = true,
                "l" | "-list" => opts.list = true,
                "i" | "-info" => opts.info = true,
                "L" | "-list-tags" => opts.list_tags = true,
                "I" | "-list-id3" => opts.list_id3 = true,
                "j" | "-json" => opts.json = true,
                // Handle combined short flags like -vc
                _ if flag.chars().all(|c| "vcaliLIj".contains(c)) => {
                    for c in flag.chars() {
                        match c {
                            'v' => opts.verbose = true,
                            'c' => opts.clear = true,
                            'a' => opts.append = true,
                            'l' => opts.list = true,
                            'i' => opts.info = true,
                            'L' => opts.list_tags = true,
                            'I' => opts.list_id3 = true,
                            'j' => opts.json = true,
                            _ => {}
                        }
                    }
                }
                _ => {
                    eprintln!("{}: unknown option: -{}", "error".red().bold(), flag);
                    print_usage();
                    std::process::exit(2);
                }
            }
        } else if opts.files.is_empty() && arg.contains('=') {
            // tag=value requests come before the file names
            opts.edits.push(arg.clone());
        } else {
            opts.files.push(PathBuf::from(arg));
        }
    }

    Ok(opts)
}

fn run(opts: Options) -> Result<()> {
    if opts.list_tags {
        cmd_list_tags();
        return Ok(());
    }
    if opts.list_id3 {
        cmd_list_id3();
        return Ok(());
    }

    if opts.files.is_empty() {
        eprintln!("{}: specify at least one file name", "error".red().bold());
        std::process::exit(2);
    }

    // Determine action
    if opts.info {
        cmd_info(&opts.files, &opts)
    } else if opts.list {
        cmd_list(&opts.files, &opts)
    } else if !opts.edits.is_empty() && opts.files.len() >= 2 {
        cmd_edit(&opts.files[0], &opts.files[1], &opts)
    } else {
        // Default: dump the tags of the input file
        cmd_list(&opts.files[..1], &opts)
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_list_tags() {
    println!("{}", "WAV tags:".cyan().bold());
    for ct in CHUNK_TYPES
        .iter()
        .filter(|ct| ct.kind == wavtags::riff::ChunkKind::Text)
    {
        println!(" {} {}", ct.id, ct.description);
    }
    println!("(INAM and IART are displayed by Mac quicklook)");
}

fn cmd_list_id3() {
    println!("{}", "ID3 tags:".cyan().bold());
    for ft in FRAME_TYPES {
        let editable = if ft.kind == wavtags::id3::FrameKind::Text {
            ""
        } else {
            " (read only)"
        };
        println!(" {} {}{}", ft.id, ft.description, editable.dimmed());
    }
}

fn cmd_list(files: &[PathBuf], opts: &Options) -> Result<()> {
    for file in files {
        process_list(file, opts)?;
    }
    Ok(())
}

fn cmd_info(files: &[PathBuf], opts: &Options) -> Result<()> {
    for file in files {
        process_info(file, opts)?;
    }
    Ok(())
}

fn cmd_edit(input: &Path, output: &Path, opts: &Options) -> Result<()> {
    let edits = opts
        .edits
        .iter()
        .map(|s| s.parse::<TagEdit>())
        .collect::<wavtags::Result<Vec<_>>>()?;

    let written = edit_file(input, output, &edits, opts.edit_options())
        .with_context(|| format!("{} -> {}", input.display(), output.display()))?;

    println!(
        "  {} {} ({} edit(s), {} bytes)",
        "✓".green(),
        output.display(),
        edits.len(),
        written
    );

    if opts.verbose {
        process_list(output, opts)?;
    }
    Ok(())
}

// =============================================================================
// File processing
// =============================================================================

fn process_list(file: &Path, opts: &Options) -> Result<()> {
    let riff = match read_file(file) {
        Ok(riff) => riff,
        Err(e) => {
            eprintln!("{} - {}", file.display().to_string().red(), e);
            return Ok(());
        }
    };
    if let Some(e) = &riff.truncated {
        eprintln!(
            "  {} {} - {}, showing tags read so far",
            "!".yellow(),
            file.display(),
            e
        );
    }

    let tags = collect_tags(&riff.root);

    if opts.json {
        let output = serde_json::json!({
            "file": file.display().to_string(),
            "tags": tags,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", format!("{}:", file.display()).cyan().bold());
    let mut id3_header = false;
    for tag in &tags {
        if tag.namespace == Namespace::Id3 && !id3_header {
            println!("ID3 tags:");
            id3_header = true;
        }
        match &tag.value {
            Some(value) => println!("  {} {}: {}", tag.tag, tag.description, value),
            None => println!("  {} {}: {} bytes", tag.tag, tag.description, tag.length),
        }
    }
    println!();
    Ok(())
}

fn process_info(file: &Path, opts: &Options) -> Result<()> {
    let riff = match read_file(file) {
        Ok(riff) => riff,
        Err(e) => {
            eprintln!("{} - {}", file.display().to_string().red(), e);
            return Ok(());
        }
    };

    let Some(format) = riff.format() else {
        eprintln!("{}: format info not found in file", file.display());
        return Ok(());
    };

    if opts.json {
        let output = serde_json::json!({
            "file": file.display().to_string(),
            "form": riff.form_type(),
            "format": format,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", format!("{}:", file.display()).cyan().bold());
    println!("  type={} ({})", format.format_code, format.format_name());
    println!("  channels={}", format.channels);
    println!("  rate={}", format.sample_rate);
    println!("  bytes/second={}", format.byte_rate);
    println!("  block align={}", format.block_align);
    println!("  bits/sample={}", format.bits_per_sample);
    println!();
    Ok(())
}

// =============================================================================
// Help / Version
// =============================================================================

fn print_version() {
    println!("wavtags version {}", VERSION);
    println!("Prints or edits the tags of RIFF (WAV) files");
}

fn print_usage() {
    println!("{} version {}", "wavtags".green().bold(), VERSION);
    println!("Prints or edits the tags from a Microsoft multimedia file, such as .wav");
    println!();
    println!("{}", "USAGE:".cyan().bold());
    println!("    wavtags -l <FILES>...");
    println!("    wavtags -i <FILES>...");
    println!("    wavtags [OPTIONS] tag=value ... <INFILE> <OUTFILE>");
    println!("    wavtags -L | -I");
    println!();
    println!("{}", "OPTIONS:".cyan().bold());
    println!("    -h, --help        Show this help");
    println!("    -v, --verbose     Verbose (debug logging, dump tags after editing)");
    println!("    -c, --clear       Clear any existing tags");
    println!("    -a, --append      Append tags to list instead of replacing");
    println!("    -l, --list        Print tags from files and exit");
    println!("    -i, --info        Display format info and exit");
    println!("    -L, --list-tags   List supported WAV tags and exit");
    println!("    -I, --list-id3    List supported ID3 tags and exit");
    println!("    -j, --json        JSON output for -l and -i");
    println!("        --version     Show version");
    println!();
    println!("{}", "EXAMPLES:".cyan().bold());
    println!("    wavtags song.wav                               Show tags");
    println!("    wavtags INAM=Title IART=Me in.wav out.wav      Set RIFF tags");
    println!("    wavtags TIT2=Title TPE1=Me in.wav out.wav      Set ID3 tags");
    println!("    wavtags ICMT='<notes.txt' in.wav out.wav       Take value from a file");
    println!("    wavtags ISBJ= in.wav out.wav                   Delete a tag");
    println!();
    println!("{}", "NOTES:".cyan().bold());
    println!("    - With no tags and no output file, dumps tags and exits");
    println!("    - If tags are specified, an output file must be specified");
    println!("    - A leading '<' for a tag value takes the value from a named file");
    println!("    - Set a tag to an empty string to delete it");
}
