use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use tracing::{info, warn};

use tone_responder::channels::{LogReplyTransport, ReplyTransport, SmtpReplyTransport, parse_raw_email};
use tone_responder::classifier::KeywordClassifier;
use tone_responder::config::{PipelineConfig, SmtpConfig};
use tone_responder::error::Error;
use tone_responder::pipeline::ReplyPipeline;
use tone_responder::store::LibSqlBackend;
use tone_responder::templates::TemplateCatalog;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let files: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if files.is_empty() {
        bail!("usage: tone-responder <message.eml>...");
    }

    let (config, smtp) = load_config().context("Invalid configuration")?;
    eprintln!("📬 Tone Responder v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    if let Some(dir) = &config.templates_dir {
        eprintln!("   Templates: {}", dir.display());
    }
    match &smtp {
        Some(smtp) => eprintln!("   SMTP: {}:{}", smtp.host, smtp.port),
        None => eprintln!("   SMTP: not configured (replies are logged only)"),
    }

    let pipeline = build_pipeline(&config, smtp.as_ref())
        .await
        .context("Failed to start pipeline")?;

    // ── Ingest ───────────────────────────────────────────────────────────
    let mut failed = 0;
    let mut batch = Vec::with_capacity(files.len());
    let mut sources = Vec::with_capacity(files.len());
    for path in &files {
        let raw = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        match parse_raw_email(&raw) {
            Ok(email) => {
                batch.push(email);
                sources.push(path);
            }
            Err(e) => {
                let err = Error::from(e);
                warn!(file = %path.display(), error = %err, "Skipping message");
                print_failure(path, &err);
                failed += 1;
            }
        }
    }

    let results = pipeline.process_batch(batch).await;
    for (path, result) in sources.into_iter().zip(results) {
        match result {
            Ok(outcome) => {
                let mut json = serde_json::to_value(&outcome)?;
                json["file"] = serde_json::Value::String(path.display().to_string());
                println!("{json}");
            }
            Err(e) => {
                failed += 1;
                print_failure(path, &e);
            }
        }
    }

    info!(total = files.len(), failed, "Done");
    if failed > 0 {
        bail!("{failed} of {} messages failed", files.len());
    }
    Ok(())
}

fn load_config() -> tone_responder::Result<(PipelineConfig, Option<SmtpConfig>)> {
    Ok((PipelineConfig::from_env()?, SmtpConfig::from_env()?))
}

/// Open the store, snapshot templates and pick the outbound transport.
async fn build_pipeline(
    config: &PipelineConfig,
    smtp: Option<&SmtpConfig>,
) -> tone_responder::Result<ReplyPipeline> {
    let db = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let mut catalog = TemplateCatalog::load(db.as_ref()).await?;
    if let Some(dir) = &config.templates_dir {
        catalog.load_dir(dir)?;
    }

    let transport: Arc<dyn ReplyTransport> = match smtp {
        Some(smtp) => Arc::new(SmtpReplyTransport::new(smtp)?),
        None => Arc::new(LogReplyTransport),
    };

    Ok(ReplyPipeline::new(
        db.clone(),
        db,
        Arc::new(KeywordClassifier::default()),
        Arc::new(catalog),
        transport,
        config,
    ))
}

fn print_failure(path: &std::path::Path, error: &Error) {
    println!(
        "{}",
        serde_json::json!({
            "file": path.display().to_string(),
            "error": error.to_string(),
        })
    );
}
