use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;

use mail_triage::config::{JsonFileSettings, SettingsStore, TriageConfig};
use mail_triage::cursor::Cursor;
use mail_triage::mailbox::{GmailMailbox, Mailbox};
use mail_triage::oracle::create_oracle;
use mail_triage::triage::{BatchSelector, TriageLoop};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings_path = std::env::var("MAIL_TRIAGE_SETTINGS")
        .unwrap_or_else(|_| "./mail-triage.json".to_string());
    let settings = JsonFileSettings::open(&settings_path)
        .await
        .with_context(|| format!("opening settings file {settings_path}"))?;

    let config = TriageConfig::from_settings(&settings).await?;

    let gmail_token = settings
        .require(
            "gmail_access_token",
            "Provide an OAuth access token with gmail.modify scope.",
        )
        .await?;
    let mailbox: Arc<dyn Mailbox> = Arc::new(GmailMailbox::new(SecretString::from(gmail_token)));

    let oracle = create_oracle(&config)?;
    let selector = BatchSelector::new(&config.exclude_subject)?;

    // The watermark must exist before any processing starts.
    let mut cursor = Cursor::load(&settings).await?;

    let triage = TriageLoop::new(mailbox, oracle, selector, config.body_limit);
    let report = triage.run(&mut cursor).await?;

    tracing::info!(
        selected = report.selected,
        processed = report.processed,
        failed = report.failed,
        watermark = %cursor.value(),
        "Run complete"
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
