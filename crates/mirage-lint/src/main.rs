//! Mirage configuration linter CLI
//!
//! Usage:
//!   mirage-lint <directory_or_file> [OPTIONS]

use clap::{Parser, ValueEnum};
use mirage_lint::{lint_path, LintIssue, LintOptions, LintResult, Severity};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Mirage configuration linter
#[derive(Parser, Debug)]
#[command(name = "mirage-lint")]
#[command(author, version, about = "Validate Mirage plugin configuration files")]
struct Args {
    /// Configuration file, or directory of *-config.{json,yaml,yml} files
    #[arg(required = true)]
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Only show errors (hide warnings and info)
    #[arg(short = 'e', long)]
    errors_only: bool,

    /// Show info-level findings
    #[arg(short, long)]
    verbose: bool,

    /// Strict mode - treat warnings as errors
    #[arg(short, long)]
    strict: bool,

    /// Skip the registration pass (route conflicts, script compilation)
    #[arg(long)]
    no_registration: bool,
}

fn main() {
    let args = Args::parse();

    let options = LintOptions {
        skip_registration: args.no_registration,
    };
    let result = lint_path(&args.path, &options);

    match args.output {
        OutputFormat::Json => match serde_json::to_string_pretty(&result) {
            Ok(output) => println!("{output}"),
            Err(e) => {
                eprintln!("{RED}Failed to serialize results: {e}{RESET}");
                std::process::exit(2);
            }
        },
        OutputFormat::Text => print_results(&result, &args),
    }

    std::process::exit(if result.fails(args.strict) { 1 } else { 0 });
}

fn visible(issue: &LintIssue, args: &Args) -> bool {
    match issue.severity {
        Severity::Error => true,
        Severity::Warning => !args.errors_only,
        Severity::Info => args.verbose && !args.errors_only,
    }
}

fn print_results(result: &LintResult, args: &Args) {
    println!("{BOLD}{CYAN}Mirage Configuration Linter{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!("{DIM}Scanning:{RESET} {CYAN}{}{RESET}\n", args.path.display());

    let mut by_file: BTreeMap<&Path, Vec<&LintIssue>> = BTreeMap::new();
    for issue in result.issues.iter().filter(|i| visible(i, args)) {
        by_file.entry(issue.file.as_path()).or_default().push(issue);
    }

    if by_file.is_empty() {
        println!("{GREEN}{BOLD}No issues found!{RESET}\n");
    }

    for (file, issues) in &by_file {
        let errors = issues.iter().filter(|i| i.severity == Severity::Error).count();
        let status = if errors > 0 {
            format!("{RED}FAIL{RESET}")
        } else {
            format!("{YELLOW}WARN{RESET}")
        };
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| file.to_string_lossy());
        println!("{status} {BOLD}{CYAN}{name}{RESET} {DIM}({} issue(s)){RESET}", issues.len());

        for issue in issues {
            let color = severity_color(issue.severity);
            let location = issue
                .location
                .as_ref()
                .map(|l| format!("{DIM}[{RESET}{CYAN}{l}{RESET}{DIM}]{RESET} "))
                .unwrap_or_default();
            println!(
                "  {color}|{RESET} {location}{BOLD}{color}{}{RESET}: {} {DIM}({color}{}{DIM}){RESET}",
                issue.severity.label(),
                issue.message,
                issue.code
            );
            if let Some(suggestion) = &issue.suggestion {
                println!("  {color}|{RESET}   {GREEN}-> {suggestion}{RESET}");
            }
        }
        println!();
    }

    println!("{DIM}{RULE}{RESET}");
    println!("{BOLD}{CYAN}Summary{RESET}");
    println!("{DIM}{RULE}{RESET}");
    println!("  {DIM}Files checked:{RESET} {BOLD}{}{RESET}", result.files_checked);
    let error_color = if result.errors > 0 { RED } else { GREEN };
    println!("  {error_color}Errors:{RESET}    {BOLD}{error_color}{}{RESET}", result.errors);
    let warning_color = if result.warnings > 0 { YELLOW } else { DIM };
    println!("  {warning_color}Warnings:{RESET}  {BOLD}{}{RESET}\n", result.warnings);

    if result.fails(args.strict) {
        println!("{RED}{BOLD}Linting failed{RESET}");
    } else if result.warnings > 0 {
        println!("{YELLOW}{BOLD}Passed with warnings{RESET}");
    } else {
        println!("{GREEN}{BOLD}All checks passed!{RESET}");
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    }
}
