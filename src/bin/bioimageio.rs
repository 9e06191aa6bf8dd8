//! bioimage.io CLI
//!
//! Command-line interface for validating, linting and packaging bioimage.io
//! resource descriptions and for publishing their JSON Schemas.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bioimageio_spec::{
    json_schema, lint, load_description, package_plan, to_json_value, to_yaml_string,
    FileStatus, ResourceType, SchemaVersion, Severity, ValidateError, ValidationOptions,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bioimageio")]
#[command(about = "Validate and package bioimage.io resource descriptions")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG takes precedence
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a resource description
    Validate {
        /// Description source: file path or URL (http:// or https://)
        source: String,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Check that packaged local files exist and match their sha256
        #[arg(long)]
        verify_files: bool,

        /// Also check that URL sources are reachable (implies --verify-files)
        #[arg(long)]
        check_urls: bool,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Write the normalized description to this file (.json or YAML)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Lint description files (rdf.yaml, bioimageio.yaml, *.bioimageio.yaml)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },

    /// Print the JSON Schema for a resource type and format version
    Schema {
        /// Resource type (model, dataset, notebook, application, collection, generic)
        #[arg(long = "type")]
        resource_type: String,

        /// Format version family, e.g. 0.5 or 0.5.4
        #[arg(long)]
        format_version: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Plan a package: list packaged files and their archive names
    Package {
        /// Description source: file path or URL (http:// or https://)
        source: String,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,

        /// Write the description with archive-local file names to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Validate {
            source,
            json,
            verify_files,
            check_urls,
            strict,
            output,
        } => {
            let options = ValidationOptions::new()
                .verify_files(verify_files || check_urls)
                .check_urls(check_urls)
                .strict(strict);
            run_validate(&source, &options, json, output.as_deref())
        }

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),

        Commands::Schema {
            resource_type,
            format_version,
            pretty,
            output,
        } => run_schema(&resource_type, &format_version, pretty, output.as_deref()),

        Commands::Package {
            source,
            json,
            output,
        } => run_package(&source, json, output.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_validate(
    source: &str,
    options: &ValidationOptions,
    json_output: bool,
    output: Option<&Path>,
) -> Result<(), u8> {
    match load_description(source, options) {
        Ok(validated) => {
            let descr = &validated.descr;
            if json_output {
                let result = serde_json::json!({
                    "valid": true,
                    "type": descr.resource_type().as_str(),
                    "format_version": descr.format_version().to_string(),
                    "warnings": validated.warnings,
                });
                println!("{result}");
            } else {
                println!(
                    "\x1b[32m✓\x1b[0m valid {} (format_version {})",
                    descr.resource_type(),
                    descr.format_version()
                );
                for warning in &validated.warnings {
                    println!("  \x1b[33m⚠\x1b[0m {warning}");
                }
            }

            if let Some(path) = output {
                let content = if is_json_path(path) {
                    to_json_value(descr)
                        .and_then(|value| serde_json::to_string_pretty(&value))
                        .map_err(|e| e.to_string())
                } else {
                    to_yaml_string(descr).map_err(|e| e.to_string())
                }
                .map_err(|e| {
                    eprintln!("Error serializing output: {e}");
                    2u8
                })?;
                write_output(path, &content)?;
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors, warnings }) => {
            if json_output {
                let result = serde_json::json!({
                    "valid": false,
                    "errors": errors,
                    "warnings": warnings,
                });
                println!("{result}");
            } else {
                eprintln!("\x1b[31m✗\x1b[0m validation failed:");
                for error in &errors {
                    eprintln!("  {error}");
                }
                for warning in &warnings {
                    eprintln!("  \x1b[33m⚠\x1b[0m {warning}");
                }
            }
            Err(1)
        }
        Err(ValidateError::Load(e)) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {msg}");
    }
}

fn is_json_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn write_output(path: &Path, content: &str) -> Result<(), u8> {
    std::fs::write(path, content).map_err(|e| {
        eprintln!("Error writing to {}: {e}", path.display());
        3u8
    })
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let result = lint(path, strict);

    if format == "json" {
        let json = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {e}");
            2u8
        })?;
        println!("{json}");
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                let field = if diag.path.is_empty() {
                    "(root)"
                } else {
                    diag.path.as_str()
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {color}{label}[{}]\x1b[0m: {field} - {}",
                        diag.code, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_schema(
    resource_type: &str,
    format_version: &str,
    pretty: bool,
    output: Option<&Path>,
) -> Result<(), u8> {
    let Some(rt) = ResourceType::parse(resource_type) else {
        eprintln!("Error: unknown resource type: {resource_type}");
        return Err(2);
    };
    let Some(version) = SchemaVersion::parse(format_version) else {
        eprintln!("Error: unknown format version: {format_version}");
        return Err(2);
    };
    let Some(schema) = json_schema(rt, version) else {
        eprintln!("Error: no {rt} schema for format version {version}");
        return Err(2);
    };

    let json = if pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {e}");
        2u8
    })?;

    match output {
        Some(path) => write_output(path, &json),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn run_package(source: &str, json_output: bool, output: Option<&Path>) -> Result<(), u8> {
    let validated = match load_description(source, &ValidationOptions::new()) {
        Ok(validated) => validated,
        Err(ValidateError::Invalid { errors, .. }) => {
            if json_output {
                println!("{}", serde_json::json!({ "valid": false, "errors": errors }));
            } else {
                eprintln!("\x1b[31m✗\x1b[0m cannot package an invalid description:");
                for error in &errors {
                    eprintln!("  {error}");
                }
            }
            return Err(1);
        }
        Err(ValidateError::Load(e)) => {
            report_error(json_output, &e.to_string());
            return Err(e.exit_code() as u8);
        }
    };

    let plan = package_plan(&validated.descr).map_err(|e| {
        report_error(json_output, &e.to_string());
        2u8
    })?;

    if json_output {
        println!("{}", serde_json::json!({ "files": plan.files }));
    } else {
        for file in &plan.files {
            println!("  {} \x1b[2m{}\x1b[0m -> {}", file.path, file.source, file.archive_name);
        }
        println!("\n{} files to package", plan.unique_files().len());
    }

    if let Some(path) = output {
        let content = if is_json_path(path) {
            serde_json::to_string_pretty(&plan.document).map_err(|e| e.to_string())
        } else {
            serde_yaml::to_string(&plan.document).map_err(|e| e.to_string())
        }
        .map_err(|e| {
            eprintln!("Error serializing output: {e}");
            2u8
        })?;
        write_output(path, &content)?;
    }
    Ok(())
}
