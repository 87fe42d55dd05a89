#![forbid(unsafe_code)]

//! Terminal front end: collects keywords and a day window, runs one batch,
//! and prints the ranked results as markdown (or JSON with `--json`).
//!
//! Keywords come from positional arguments and/or `--file`. With neither,
//! piped stdin is read as the keyword box; on a terminal the user is
//! prompted for keywords and the day window instead.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use std::{
    fs,
    io::{self, BufRead, IsTerminal, Read, Write},
    path::PathBuf,
};
use viral_finder::{
    batch::{BatchError, BatchRequest, run_batch_with_progress},
    config::{
        DEFAULT_CONFIG_PATH, DEFAULT_DAY_WINDOW, FinderSettings, MAX_DAY_WINDOW, MIN_DAY_WINDOW,
        load_config_from,
    },
    logging,
    present::{self, NO_KEYWORDS_NOTICE},
    youtube::YoutubeApi,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Find small-channel YouTube videos that are breaking out."
)]
struct Cli {
    #[arg(value_name = "KEYWORD", help = "Search keywords (one search per keyword)")]
    keywords: Vec<String>,
    #[arg(
        short = 'f',
        long = "file",
        value_name = "PATH",
        help = "Read additional keywords from a file, one per line"
    )]
    file: Option<PathBuf>,
    #[arg(
        short = 'd',
        long = "days",
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..=30),
        help = "Search videos published in the last N days (1-30, default 7)"
    )]
    days: Option<u32>,
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the config file"
    )]
    config: PathBuf,
    #[arg(
        long = "api-key",
        value_name = "KEY",
        help = "YouTube Data API key (overrides config and YOUTUBE_API_KEY)"
    )]
    api_key: Option<String>,
    #[arg(long = "json", help = "Print the batch report as JSON")]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("viral_finder=warn");

    let mut config = load_config_from(&cli.config)?;
    if let Some(key) = cli.api_key.clone() {
        config.finder.api_key = Some(key);
    }
    let settings = config.finder;

    let interactive = cli.keywords.is_empty() && cli.file.is_none() && io::stdin().is_terminal();
    let terms = if interactive {
        let stdin = io::stdin();
        prompt_keywords(&mut stdin.lock())?
    } else {
        gather_terms(&cli)?
    };
    let day_window = match cli.days {
        Some(days) => days,
        None if interactive => {
            let stdin = io::stdin();
            prompt_day_window(&mut stdin.lock())?
        }
        None => DEFAULT_DAY_WINDOW,
    };

    let (request, api_key) = match prepare_run(&terms, day_window, &settings) {
        Ok(prepared) => prepared,
        Err(err) if err.downcast_ref::<BatchError>() == Some(&BatchError::NoKeywords) => {
            eprintln!("Warning: {NO_KEYWORDS_NOTICE}");
            std::process::exit(1);
        }
        Err(err) => return Err(err),
    };

    let api = YoutubeApi::new(&settings.api_base_url, api_key, settings.request_timeout);
    let show_progress = !cli.json;
    let report = run_batch_with_progress(
        &api,
        &settings,
        &request,
        Utc::now(),
        |position, total, keyword| {
            if show_progress {
                println!("[{position}/{total}] Searching: {keyword}");
            }
        },
    )?;

    for warning in &report.warnings {
        eprintln!("  Warning: {}", present::warning_line(warning));
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("serializing batch report")?;
        println!("{json}");
    } else {
        println!();
        print!("{}", present::render_markdown(&report.results));
    }

    Ok(())
}

/// Checks the keywords before the API key, so a run with neither reports the
/// missing keywords.
fn prepare_run(
    terms: &[String],
    day_window: u32,
    settings: &FinderSettings,
) -> Result<(BatchRequest, String)> {
    let request = BatchRequest::from_terms(terms, day_window)?;
    let api_key = settings.require_api_key()?.to_owned();
    Ok((request, api_key))
}

/// Positional keywords followed by the lines of `--file`. With neither,
/// stdin is read whole and split into lines.
fn gather_terms(cli: &Cli) -> Result<Vec<String>> {
    let mut terms = cli.keywords.clone();
    if let Some(path) = &cli.file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Reading keywords from {}", path.display()))?;
        terms.extend(content.lines().map(str::to_owned));
    }
    if cli.keywords.is_empty() && cli.file.is_none() {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("Reading keywords from stdin")?;
        terms.extend(content.lines().map(str::to_owned));
    }
    Ok(terms)
}

/// Reads keyword lines until an empty line or end of input.
fn prompt_keywords(input: &mut impl BufRead) -> Result<Vec<String>> {
    println!("Enter keywords (one per line), then an empty line to start:");
    let mut terms = Vec::new();
    loop {
        print!("> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if input.read_line(&mut line).context("Reading keyword input")? == 0 {
            break;
        }
        if line.trim().is_empty() {
            break;
        }
        terms.push(line.trim().to_owned());
    }
    Ok(terms)
}

/// Asks for the day window until a value in range is given. An empty answer
/// keeps the default.
fn prompt_day_window(input: &mut impl BufRead) -> Result<u32> {
    loop {
        print!(
            "Search videos published in last N days ({MIN_DAY_WINDOW}-{MAX_DAY_WINDOW}) [{DEFAULT_DAY_WINDOW}]: "
        );
        io::stdout().flush().ok();
        let mut line = String::new();
        if input.read_line(&mut line).context("Reading day window")? == 0 {
            return Ok(DEFAULT_DAY_WINDOW);
        }
        match parse_day_window(&line) {
            Ok(days) => return Ok(days),
            Err(err) => println!("{err}"),
        }
    }
}

fn parse_day_window(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(DEFAULT_DAY_WINDOW);
    }
    let days: u32 = trimmed
        .parse()
        .with_context(|| format!("'{trimmed}' is not a whole number of days"))?;
    if !(MIN_DAY_WINDOW..=MAX_DAY_WINDOW).contains(&days) {
        bail!("Please pick between {MIN_DAY_WINDOW} and {MAX_DAY_WINDOW} days.");
    }
    Ok(days)
}
