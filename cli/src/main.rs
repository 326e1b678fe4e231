//! docmark CLI - document to Markdown conversion tool

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map, Value};

use docmark::config::{deep_merge, expand_dotted, parse_assignment};
use docmark::{
    create_directory_processor, create_processor, Access, Config, ProcessingResult, Profile,
};

#[derive(Parser)]
#[command(name = "docmark")]
#[command(version)]
#[command(about = "Convert text, Markdown, HTML and XML documents to Markdown", long_about = None)]
struct Cli {
    /// Input file or directory
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Output file or directory
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    options: ConvertArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args, Clone)]
struct ConvertArgs {
    /// Configuration profile (standard, strict, fast)
    #[arg(short, long, default_value = "standard", env = "DOCMARK_PROFILE")]
    profile: String,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Only convert files with these extensions (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    extensions: Vec<String>,

    /// Override an option, e.g. converters.html.parser=strict (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// JSON file with option overrides
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory files may be read from and written to (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,

    /// Output format
    #[arg(long, default_value = "markdown")]
    format: String,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a file or a directory
    Convert {
        /// Input file or directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file or directory
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: ConvertArgs,
    },

    /// Show the detected format, metadata and structure of a file
    Info {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        options: ConvertArgs,
    },

    /// Print the resolved configuration of a profile
    Profile {
        /// Profile name
        #[arg(default_value = "standard")]
        name: String,

        /// Override an option (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Show version information
    Version,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert {
            input,
            output,
            options,
        }) => cmd_convert(&input, output.as_deref(), &options),
        Some(Commands::Info { input, options }) => cmd_info(&input, &options).map(|_| true),
        Some(Commands::Profile { name, overrides }) => cmd_profile(&name, &overrides).map(|_| true),
        Some(Commands::Version) => {
            cmd_version();
            Ok(true)
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), &cli.options)
            } else {
                println!("{}", "Usage: docmark <INPUT> [OUTPUT]".yellow());
                println!("       docmark --help for more information");
                Ok(true)
            }
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Merge the config file, `--root` and `--set` overrides, in that order.
fn build_overrides(args: &ConvertArgs) -> CliResult<Value> {
    let mut overrides = json!({});
    if let Some(path) = &args.config {
        let file = Config::load_json_file(path)?;
        overrides = deep_merge(&overrides, &expand_dotted(&file)?)?;
    }
    if !args.roots.is_empty() {
        let roots: Vec<Value> = args
            .roots
            .iter()
            .map(|r| Value::String(r.to_string_lossy().into_owned()))
            .collect();
        let patch = json!({ "security": { "allowed_roots": roots } });
        overrides = deep_merge(&overrides, &patch)?;
    }
    overrides = merge_assignments(overrides, &args.overrides)?;
    Ok(overrides)
}

fn merge_assignments(mut overrides: Value, assignments: &[String]) -> CliResult<Value> {
    for assignment in assignments {
        let (path, value) = parse_assignment(assignment)?;
        let mut single = Map::new();
        single.insert(path, value);
        overrides = deep_merge(&overrides, &expand_dotted(&Value::Object(single))?)?;
    }
    Ok(overrides)
}

/// Returns `Ok(false)` when any file failed.
fn cmd_convert(input: &Path, output: Option<&Path>, args: &ConvertArgs) -> CliResult<bool> {
    let overrides = build_overrides(args)?;

    let results = if input.is_dir() {
        let output_dir = output
            .map(Path::to_path_buf)
            .ok_or("an output directory is required when converting a directory")?;
        let processor = create_directory_processor(&args.profile, &overrides)?;
        let extensions = (!args.extensions.is_empty()).then_some(args.extensions.as_slice());

        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Converting {}...", input.display()));
        let results = processor.process_directory(
            input,
            &output_dir,
            &args.format,
            args.recursive,
            extensions,
        );
        pb.finish_and_clear();
        results?
    } else {
        let output_file = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| input.with_extension("md"));
        let processor = create_processor(&args.profile, &overrides)?;
        vec![processor.process_file(input, &output_file, &args.format)]
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }

    Ok(results.iter().all(ProcessingResult::is_success))
}

fn print_results(results: &[ProcessingResult]) {
    for result in results {
        if result.is_success() {
            let output = result
                .output_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!(
                "  {} {} {} {}",
                "✓".green(),
                result.input_path().display(),
                "→".dimmed(),
                output
            );
        } else {
            let message = result
                .error()
                .map(|e| format!("{}: {}", e.kind, e.message))
                .unwrap_or_default();
            println!(
                "  {} {} {}",
                "✗".red(),
                result.input_path().display(),
                message.red()
            );
        }
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    let summary = format!(
        "{} converted, {} failed",
        results.len() - failed,
        failed
    );
    if failed == 0 {
        println!("\n{}", summary.green().bold());
    } else {
        println!("\n{}", summary.yellow().bold());
    }
}

fn cmd_info(input: &Path, args: &ConvertArgs) -> CliResult<()> {
    let overrides = build_overrides(args)?;
    let processor = create_processor(&args.profile, &overrides)?;
    let path = processor.guard().validate_path(input, Access::Read)?;

    let bytes = std::fs::read(&path)?;
    let decoded = docmark::detect::decode_bytes(&bytes);
    let adapter = processor.registry().detect(Some(&path), &decoded.text)?;
    let doc = adapter.parse(&decoded.text)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), adapter.name());
    println!("{}: {}", "Encoding".bold(), decoded.encoding);
    for (key, value) in doc.metadata.iter() {
        println!("{}: {}", key.bold(), value);
    }

    println!();
    println!("{}", "Content Statistics".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    let text = doc.plain_text();
    let headings = doc
        .blocks
        .iter()
        .filter(|b| matches!(b, docmark::Block::Heading { .. }))
        .count();
    let list_items: usize = doc
        .blocks
        .iter()
        .map(|b| match b {
            docmark::Block::List(list) => list.total_items(),
            _ => 0,
        })
        .sum();

    println!("{}: {}", "Blocks".bold(), doc.block_count());
    println!("{}: {}", "Headings".bold(), headings);
    println!("{}: {}", "List items".bold(), list_items);
    println!("{}: {}", "Words".bold(), text.split_whitespace().count());
    println!("{}: {}", "Characters".bold(), text.chars().count());

    Ok(())
}

fn cmd_profile(name: &str, assignments: &[String]) -> CliResult<()> {
    let profile: Profile = name.parse()?;
    let overrides = merge_assignments(json!({}), assignments)?;
    let config = Config::from_profile(profile)?.with_overrides(&overrides)?;
    println!("{}", serde_json::to_string_pretty(config.value())?);
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "docmark".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("Text, Markdown, HTML and XML to Markdown conversion tool");
    println!();
    println!("License: MIT");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(overrides: &[&str], roots: &[&str]) -> ConvertArgs {
        ConvertArgs {
            profile: "standard".to_string(),
            recursive: false,
            extensions: Vec::new(),
            overrides: overrides.iter().map(|s| s.to_string()).collect(),
            config: None,
            roots: roots.iter().map(PathBuf::from).collect(),
            format: "markdown".to_string(),
            json: false,
        }
    }

    #[test]
    fn test_build_overrides() {
        let value = build_overrides(&args(
            &["converters.html.parser=strict", "parallel.worker_count=2"],
            &["/data"],
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({
                "converters": { "html": { "parser": "strict" } },
                "parallel": { "worker_count": 2 },
                "security": { "allowed_roots": ["/data"] }
            })
        );
    }

    #[test]
    fn test_later_assignment_wins() {
        let value = merge_assignments(
            json!({}),
            &["general.overwrite_existing=false".into(), "general.overwrite_existing=true".into()],
        )
        .unwrap();
        assert_eq!(value, json!({ "general": { "overwrite_existing": true } }));
    }

    #[test]
    fn test_bad_assignment() {
        assert!(build_overrides(&args(&["no_equals_sign"], &[])).is_err());
    }

    #[test]
    fn test_info_stays_inside_roots() {
        let root = tempfile::TempDir::new().unwrap();
        let elsewhere = tempfile::TempDir::new().unwrap();
        std::fs::write(root.path().join("a.md"), "# Inside\n").unwrap();
        std::fs::write(elsewhere.path().join("b.md"), "# Outside\n").unwrap();
        let root_arg = root.path().to_string_lossy().into_owned();
        let options = args(&[], &[&root_arg]);

        assert!(cmd_info(&root.path().join("a.md"), &options).is_ok());
        let err = cmd_info(&elsewhere.path().join("b.md"), &options).unwrap_err();
        let err = err.downcast::<docmark::Error>().unwrap();
        assert_eq!(err.kind(), docmark::ErrorKind::Security);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "docmark",
            "in",
            "out",
            "--recursive",
            "--ext",
            "html",
            "--set",
            "converters.html.parser=strict",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("in")));
        assert!(cli.options.recursive);
        assert_eq!(cli.options.extensions, ["html"]);
    }
}
