//! Warm-cache binary - pre-populates the server's translation cache
//!
//! Reads one storefront string per line and looks each of them up in every
//! target locale through a running translation server, so shoppers never pay
//! for the first provider call.
//!
//! Usage:
//!   cargo run --bin warm-cache -- data/strings.txt          # All target locales
//!   cargo run --bin warm-cache -- data/strings.txt fr de    # Only French and German
//!
//! Optional environment variables:
//! - TRANSLATE_SERVER_URL (defaults to http://127.0.0.1:$PORT)
//! - TRANSLATE_DEBOUNCE_MS (defaults to 50)

use anyhow::{bail, Context, Result};
use std::fs;
use std::time::Duration;
use storefront_translate::client::{Coalescer, CoalescerConfig, HttpTransport};
use storefront_translate::config::Config;
use storefront_translate::i18n::{Language, LanguageRegistry};
use storefront_translate::wire::dedup_preserving_order;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settle rounds after the first pass; each one re-sends whatever failed.
const RETRY_ROUNDS: usize = 2;

fn read_strings(path: &str) -> Result<Vec<String>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read strings file {}", path))?;

    Ok(dedup_preserving_order(
        content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty()),
    ))
}

fn target_locales(codes: &[String]) -> Result<Vec<Language>> {
    if codes.is_empty() {
        return LanguageRegistry::get()
            .list_targets()
            .iter()
            .map(|config| Language::from_code(config.code))
            .collect::<Result<_, _>>()
            .context("Language registry is misconfigured");
    }

    codes
        .iter()
        .map(|code| -> Result<Language> {
            let language = Language::from_code(code)?;
            if language.is_canonical() {
                bail!("{} is the source locale, nothing to warm", code);
            }
            Ok(language)
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("storefront_translate=info".parse()?)
                .add_directive("warm_cache=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((path, codes)) = args.split_first() else {
        bail!("Usage: warm-cache <strings-file> [locale ...]");
    };

    let config = Config::from_env()?;
    let texts = read_strings(path)?;
    let locales = target_locales(codes)?;

    info!(
        "Warming {} strings for {} locales via {}",
        texts.len(),
        locales.len(),
        config.server_url
    );

    let transport = HttpTransport::new(&config.server_url, REQUEST_TIMEOUT)
        .context("Failed to build HTTP client")?;
    let coalescer = Coalescer::new(
        transport,
        Language::canonical(),
        CoalescerConfig {
            debounce: config.debounce,
            ..Default::default()
        },
    );

    let mut incomplete = 0;
    for locale in locales {
        for text in &texts {
            coalescer.lookup(text, locale);
        }
        coalescer.settle().await;

        for _ in 0..RETRY_ROUNDS {
            if coalescer.failed_len() == 0 {
                break;
            }
            coalescer.retry_failed();
            coalescer.settle().await;
        }

        let translated = coalescer.snapshot(locale).len();
        if translated < texts.len() {
            incomplete += 1;
            warn!(
                "{} ({}): {}/{} strings translated",
                locale.name(),
                locale,
                translated,
                texts.len()
            );
        } else {
            info!("{} ({}): all {} strings translated", locale.name(), locale, translated);
        }
    }

    if incomplete > 0 {
        bail!("{} locales were only partially warmed", incomplete);
    }

    info!("Cache warm-up complete");
    Ok(())
}
