use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use scamshield_lib::models::{AnalysisResult, Language, ScanMode};
use scamshield_lib::services::{
    get_api_key, ConfigStore, Dashboard, GeminiClient, HistoryStore, ScamClassifier, ScanOutcome,
    PROVIDER_NAME,
};
use std::path::Path;

const USAGE: &str = "Usage:
  scamshield scan (--text <message> | --image <path>) [--deep] [--lang en|es|fr|ar] [--json]
  scamshield history [--limit <n>] [--json]
  scamshield stats
  scamshield clear-history
  scamshield config set-key <key>
  scamshield config delete-key

Environment:
  GEMINI_API_KEY           API key for the hosted model (or `scamshield config set-key`)
  GEMINI_API_URL           Override the model endpoint base URL
  SCAMSHIELD_LOG_DIR       Directory for session log files";

fn preview(s: &str, max_chars: usize) -> String {
    let mut out: String = s.chars().take(max_chars).collect();
    if s.chars().count() > max_chars {
        out.push_str("...");
    }
    out.replace('\n', " ")
}

fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

fn image_data_uri(path: &str) -> Result<String> {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        other => bail!("unsupported image type '{}': use a JPEG, PNG or WebP file", other),
    };

    let bytes = std::fs::read(path).with_context(|| format!("read image failed: {}", path))?;
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

fn print_result(result: &AnalysisResult, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!("Verdict: {}  (risk {:.0}/100)", result.verdict, result.risk_score);
    if !result.indicators.is_empty() {
        println!();
        println!("What we noticed:");
        for indicator in &result.indicators {
            println!("  - {}", indicator);
        }
    }
    println!();
    println!("Why: {}", result.reasoning);
    println!();
    println!("What to do: {}", result.advice);
    if let Some(sources) = &result.sources {
        println!();
        println!("Sources:");
        for s in sources {
            println!("  - {} <{}>", s.title, s.uri);
        }
    }
    Ok(())
}

async fn run_scan(store: &ConfigStore, args: &[String]) -> Result<()> {
    let config = store.load()?;

    let language = match parse_arg_value(args, "--lang") {
        Some(code) => Language::from_code(&code).ok_or_else(|| anyhow!("unknown language '{}'", code))?,
        None => config.default_language,
    };
    let mode = ScanMode {
        deep_scan: has_flag(args, "--deep"),
        language,
    };

    let (content, is_image) = match (parse_arg_value(args, "--text"), parse_arg_value(args, "--image")) {
        (Some(text), None) => (text, false),
        (None, Some(path)) => (image_data_uri(&path)?, true),
        _ => bail!("give exactly one of --text or --image\n\n{}", USAGE),
    };

    let api_key = get_api_key()
        .ok_or_else(|| anyhow!("no API key configured: set GEMINI_API_KEY or run `scamshield config set-key <key>`"))?;
    let transport = match config.proxy.as_ref().and_then(|p| p.active_url()) {
        Some(proxy) => GeminiClient::with_proxy(&api_key, &config.classifier, proxy)?,
        None => GeminiClient::new(&api_key, &config.classifier)?,
    };

    let history = HistoryStore::open(store.history_file(), config.history.clone());
    let dashboard = Dashboard::new(ScamClassifier::new(transport, config.classifier.clone()), history);

    match dashboard.scan(&content, is_image, &mode).await? {
        ScanOutcome::Completed(result) => print_result(&result, has_flag(args, "--json")),
        ScanOutcome::Superseded => bail!("scan was cancelled"),
    }
}

fn run_history(store: &ConfigStore, args: &[String]) -> Result<()> {
    let config = store.load()?;
    let history = HistoryStore::open(store.history_file(), config.history);
    let limit: usize = parse_arg_value(args, "--limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);
    let entries: Vec<&AnalysisResult> = history.entries().iter().take(limit).collect();

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No scans yet.");
        return Ok(());
    }

    for entry in entries {
        let when = chrono::DateTime::from_timestamp_millis(entry.timestamp)
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<10} {:>3.0}  {}",
            when,
            entry.verdict,
            entry.risk_score,
            preview(&entry.content, 60)
        );
    }
    if history.len() > limit {
        println!("... ({} more)", history.len() - limit);
    }
    Ok(())
}

fn run_stats(store: &ConfigStore) -> Result<()> {
    let config = store.load()?;
    let stats = HistoryStore::open(store.history_file(), config.history).stats();
    println!("Total checks: {}", stats.total);
    println!("Scams:        {}", stats.scams);
    println!("Suspicious:   {}", stats.suspicious);
    println!("Safe:         {}", stats.safe);
    Ok(())
}

fn run_clear(store: &ConfigStore) -> Result<()> {
    let config = store.load()?;
    let mut history = HistoryStore::open(store.history_file(), config.history);
    history.clear()?;
    println!("History cleared.");
    Ok(())
}

fn run_config(store: &ConfigStore, args: &[String]) -> Result<()> {
    match args.first().map(String::as_str) {
        Some("set-key") => {
            let key = args
                .get(1)
                .map(|k| k.trim())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| anyhow!("missing key\n\n{}", USAGE))?;
            store.set_api_key(PROVIDER_NAME, key)?;
            println!("API key saved to {}", store.config_file().display());
        }
        Some("delete-key") => {
            store.delete_api_key(PROVIDER_NAME)?;
            println!("API key removed.");
        }
        _ => bail!("unknown config command\n\n{}", USAGE),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    scamshield_lib::init_logging();

    let config_dir = ConfigStore::default_config_dir()
        .ok_or_else(|| anyhow!("could not determine the config directory"))?;
    let store = ConfigStore::new(config_dir);

    match command.as_str() {
        "scan" => run_scan(&store, &args[2..]).await,
        "history" => run_history(&store, &args[2..]),
        "stats" => run_stats(&store),
        "clear-history" => run_clear(&store),
        "config" => run_config(&store, &args[2..]),
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("unknown command '{}'\n\n{}", other, USAGE),
    }
}
