//! Keyplan: App Store keyword planner server and CLI.

use std::path::PathBuf;
use std::sync::Arc;

use keyplan_core::{Error, KeyplanConfig, PipelineOptions};
use keyplan_ingest::RawListing;
use keyplan_llm::LLMConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
mod state;

use routes::keywords::KeywordsResponse;
use state::AppState;

/// Arguments of `keyplan run`.
#[derive(Debug, PartialEq)]
struct RunArgs {
    identifier: Option<String>,
    country: Option<String>,
    options_file: Option<PathBuf>,
    listing_file: Option<PathBuf>,
}

fn parse_run_args(args: &[String]) -> std::result::Result<RunArgs, String> {
    let mut identifier = None;
    let mut country = None;
    let mut options_file = None;
    let mut listing_file = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--country" => {
                let value = iter.next().ok_or("--country needs a value")?;
                country = Some(value.trim().to_lowercase());
            }
            "--options" => {
                let value = iter.next().ok_or("--options needs a file path")?;
                options_file = Some(PathBuf::from(value));
            }
            "--listing" => {
                let value = iter.next().ok_or("--listing needs a file path")?;
                listing_file = Some(PathBuf::from(value));
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag {}", flag)),
            value => {
                if identifier.replace(value.to_string()).is_some() {
                    return Err("only one app URL or id may be given".into());
                }
            }
        }
    }

    if identifier.is_none() && listing_file.is_none() {
        return Err("missing app URL, id or --listing file".into());
    }
    Ok(RunArgs {
        identifier,
        country,
        options_file,
        listing_file,
    })
}

/// Execute one run and print the JSON report. Returns the process exit code.
async fn run_command(args: &[String]) -> i32 {
    let run_args = match parse_run_args(args) {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{}", msg);
            eprintln!(
                "Usage: keyplan run <app-url-or-id> [--country xx] [--options file.json] [--listing file.json]"
            );
            return Error::MalformedInput(msg).exit_code();
        }
    };

    match execute_run(run_args).await {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                Error::Json(e).exit_code()
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn execute_run(args: RunArgs) -> keyplan_core::Result<KeywordsResponse> {
    let config = KeyplanConfig::from_env()?;
    let mut options = match &args.options_file {
        Some(path) => PipelineOptions::from_file(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
        None => config.default_options,
    };
    if let Some(country) = args.country {
        options.country = country;
    }
    options.validate()?;

    let listing = args.listing_file.as_deref().map(read_listing).transpose()?;

    let llm_config = LLMConfig::from_env();
    let (pipeline, embedder, index) = state::build_pipeline(&llm_config)?;
    info!("Running with embedder={} index={}", embedder, index);
    let report = match (&listing, &args.identifier) {
        (Some(listing), _) => pipeline.run_document(listing, &options).await?,
        (None, Some(identifier)) => pipeline.run_with_report(identifier, &options).await?,
        (None, None) => return Err(Error::MalformedInput("missing app URL or id".into())),
    };
    Ok(report.into())
}

/// Read an already-scraped listing (title, meta keywords, competitors).
fn read_listing(path: &std::path::Path) -> keyplan_core::Result<RawListing> {
    let payload = std::fs::read_to_string(path)?;
    serde_json::from_str(&payload)
        .map_err(|e| Error::MalformedInput(format!("{}: unparseable listing: {}", path.display(), e)))
}

fn print_help() {
    println!("Keyplan: App Store keyword planner");
    println!();
    println!("Usage: keyplan [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve                      Start the HTTP server");
    println!("  run <app-url-or-id> [--country xx]  Plan keywords for one app and print JSON");
    println!("      [--options file.json] [--listing file.json]");
    println!("  help                                Show this help message");
    println!();
    println!("Environment:");
    println!("  PORT, KEYPLAN_OPTIONS, KEYPLAN_LLM_PROVIDER,");
    println!("  GROQ_API_KEY, ANTHROPIC_API_KEY, OPENAI_API_KEY,");
    println!("  KEYPLAN_EMBEDDING_API_KEY, KEYPLAN_EMBEDDING_BASE_URL, KEYPLAN_EMBEDDING_MODEL,");
    println!("  KEYPLAN_EMBEDDING_DIM, TYPESENSE_HOST, TYPESENSE_API_KEY, TYPESENSE_COLLECTION,");
    println!("  TYPESENSE_VECTOR_FIELD");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; logs go to stderr so `run` output stays clean JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    // Handle CLI subcommands
    if args.len() > 1 {
        match args[1].as_str() {
            "run" => {
                let code = run_command(&args[2..]).await;
                std::process::exit(code);
            }
            "serve" => {}
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Unknown command: {}. Use 'keyplan help' for usage.", args[1]);
                std::process::exit(Error::MalformedInput(args[1].clone()).exit_code());
            }
        }
    }

    // Server startup
    let config = KeyplanConfig::from_env()?;
    let port = config.port;
    let state = Arc::new(AppState::new(config, LLMConfig::from_env()));

    let app = routes::build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Keyplan server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_run_args() {
        let parsed = parse_run_args(&args(&[
            "https://apps.apple.com/us/app/pixel-runner/id42",
            "--country",
            "GB",
            "--options",
            "opts.json",
        ]))
        .unwrap();
        assert_eq!(
            parsed.identifier.as_deref(),
            Some("https://apps.apple.com/us/app/pixel-runner/id42")
        );
        assert_eq!(parsed.country.as_deref(), Some("gb"));
        assert_eq!(parsed.options_file, Some(PathBuf::from("opts.json")));
        assert_eq!(parsed.listing_file, None);
    }

    #[test]
    fn test_parse_run_args_listing_only() {
        let parsed = parse_run_args(&args(&["--listing", "listing.json"])).unwrap();
        assert_eq!(parsed.identifier, None);
        assert_eq!(parsed.listing_file, Some(PathBuf::from("listing.json")));
        assert!(parse_run_args(&args(&["--listing"])).is_err());
    }

    #[test]
    fn test_read_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listing.json");
        std::fs::write(
            &path,
            r#"{"appid": "77", "appname": "Tiny Tower",
                "competitor_apps_keywords": [{"appname": "Pocket Frogs", "keywords": ["frog pond"]}]}"#,
        )
        .unwrap();
        let listing = read_listing(&path).unwrap();
        assert_eq!(listing.app_id.as_deref(), Some("77"));
        assert_eq!(listing.competitors[0].name, "Pocket Frogs");

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(read_listing(&path), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_parse_run_args_errors() {
        assert!(parse_run_args(&args(&[])).is_err());
        assert!(parse_run_args(&args(&["42", "--country"])).is_err());
        assert!(parse_run_args(&args(&["42", "43"])).is_err());
        assert!(parse_run_args(&args(&["42", "--verbose"])).is_err());
    }

    #[tokio::test]
    async fn test_bad_options_file_exits_with_config_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{"dedupThreshold": 1.5}"#).unwrap();

        let code = run_command(&args(&["42", "--options", path.to_str().unwrap()])).await;
        assert_eq!(code, 8);
    }

    #[tokio::test]
    async fn test_missing_identifier_exit_code() {
        assert_eq!(run_command(&args(&["--country", "us"])).await, 2);
    }
}
