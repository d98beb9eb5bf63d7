//! Relay binary: serve `/generate`, or manage the credential file.

use anyhow::Context;
use clap::Parser;
use llm_relay::{
    config::{Cli, Command, RelayConfig},
    credentials::append_credential,
    logging, server, CredentialRing, CredentialStore, EnvFileStore, GenerateHandler,
    ModelClient, TemplateRenderer,
};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RelayConfig::from_settings(&cli.settings)?;
    logging::init_tracing(&config.log_level);

    let store: Arc<dyn CredentialStore> =
        Arc::new(EnvFileStore::new(&config.env_file, &config.key_prefix));

    match cli.command.unwrap_or(Command::Serve) {
        Command::AddKey { key } => add_key(store, &key).await,
        Command::Serve => serve(config, store).await,
    }
}

async fn add_key(store: Arc<dyn CredentialStore>, key: &str) -> anyhow::Result<()> {
    let mut keys = store.load().await?;
    if !append_credential(&mut keys, key)? {
        println!("Key already present in {}", store.describe());
        return Ok(());
    }
    store
        .save(&keys)
        .await
        .with_context(|| format!("writing {}", store.describe()))?;
    println!("Added key #{} to {}", keys.len(), store.describe());
    Ok(())
}

async fn serve(config: RelayConfig, store: Arc<dyn CredentialStore>) -> anyhow::Result<()> {
    let ring = CredentialRing::load(store)
        .await
        .context("loading API keys")?;
    tracing::info!(
        keys = ring.len().await,
        model = %config.model,
        max_retries = config.retry.max_retries,
        "starting relay"
    );

    let client = ModelClient::builder(Arc::new(ring))
        .base_url(&config.base_url)
        .model(&config.model)
        .config(config.generation.clone())
        .retry_policy(config.retry.clone())
        .build();

    let renderer = TemplateRenderer::new(&config.template_dir, &config.template_ext);
    if !renderer.template_path(&config.template_name).exists() {
        tracing::warn!(
            template = %renderer.template_path(&config.template_name).display(),
            "template missing; /generate will fail until it exists"
        );
    }
    let handler = GenerateHandler::new(renderer, Arc::new(client))
        .with_template(&config.template_name);

    let app = server::router(Arc::new(handler));
    server::serve(config.addr, app, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
