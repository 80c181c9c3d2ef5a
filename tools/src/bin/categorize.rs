use std::env;

use anyhow::Context;
use categorizer::{
    phishing::PhishingDetector, prompt::OllamaClient, Categorizer, CategorizerConfig,
};
use tools::{categories_table, load_emails};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: categorize <emails.json> [--llm] [--phishing]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let use_llm = args.iter().any(|a| a == "--llm");
    let check_phishing = args.iter().any(|a| a == "--phishing");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .context(USAGE)?;

    let mut config = CategorizerConfig::from_env()?;
    if let Ok(url) = env::var("OLLAMA_URL") {
        config.llm.base_url = url;
    }
    if let Ok(model) = env::var("OLLAMA_MODEL") {
        config.llm.model = model;
    }

    let emails = load_emails(path)?;
    tracing::info!("Loaded {} emails from {}", emails.len(), path);

    let client = OllamaClient::from_config(&config.llm);
    let llm_available = (use_llm || check_phishing) && client.is_available().await;
    if (use_llm || check_phishing) && !llm_available {
        tracing::warn!(
            "Ollama model '{}' is not available at {}, continuing without it",
            config.llm.model,
            config.llm.base_url
        );
    }

    let phishing = PhishingDetector::new(&config.phishing);
    let categorizer = Categorizer::new(config);
    let result = if use_llm && llm_available {
        categorizer.categorize_with_llm(&emails, &client).await
    } else {
        categorizer.categorize(&emails)
    };

    println!("{}", categories_table(&result, &emails));

    if check_phishing {
        let generator = llm_available.then_some(&client);
        for email in &emails {
            let report = phishing.analyze(email, generator).await;
            println!(
                "[{:>3}] {:<6} {} ({})",
                report.risk_score,
                report.risk_level.as_ref(),
                email.subject,
                report.indicators.join(", ")
            );
        }
    }

    Ok(())
}
