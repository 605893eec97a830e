mod cli_args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};

use stitch_discord::{
    run_discord_gateway, DiscordClient, DiscordGatewayConfig, DEFAULT_GATEWAY_INTENTS,
};
use stitch_github::{GithubClient, RepoRef};
use stitch_runtime::{run_webhook_server, BridgeRuntime, BridgeRuntimeConfig};

use crate::cli_args::Cli;

const CHAT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let repo = RepoRef::parse(&cli.github_repo)?;
    let repo_slug = repo.as_slug();

    let chat = Arc::new(DiscordClient::new(
        cli.discord_api_base.clone(),
        cli.discord_token.clone(),
        cli.forum_channel_id.clone(),
        cli.http_timeout_ms,
    )?);
    let tracker = Arc::new(GithubClient::new(
        cli.github_api_base.clone(),
        cli.github_token.clone(),
        repo,
        cli.http_timeout_ms,
    )?);

    let config = BridgeRuntimeConfig {
        forum_channel_id: cli.forum_channel_id.clone(),
        guild_id: cli.guild_id,
        repo_slug,
        archive_debounce: Duration::from_millis(cli.archive_debounce_ms),
        assignment_ttl: Duration::from_millis(cli.assignment_ttl_ms),
    };
    let runtime = Arc::new(BridgeRuntime::new(config, chat, tracker));

    runtime.refresh_forum_tags().await;
    let registered = runtime
        .reconcile()
        .await
        .context("startup reconciliation failed")?;
    println!("issue bridge startup reconcile complete: registered={registered}");
    if cli.reconcile_once {
        return Ok(());
    }

    let (events_tx, events_rx) = mpsc::channel(CHAT_EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let gateway_config = DiscordGatewayConfig {
        gateway_url: cli.discord_gateway_url.clone(),
        bot_token: cli.discord_token.clone(),
        intents: DEFAULT_GATEWAY_INTENTS,
        reconnect_delay: Duration::from_millis(cli.gateway_reconnect_delay_ms),
    };
    let gateway_task = tokio::spawn(run_discord_gateway(gateway_config, events_tx, shutdown_rx));
    let event_loop = tokio::spawn(Arc::clone(&runtime).run_chat_event_loop(events_rx));

    // The webhook server owns the foreground; it returns on ctrl-c.
    let served = run_webhook_server(
        Arc::clone(&runtime),
        &cli.webhook_bind,
        cli.webhook_secret.clone(),
    )
    .await;

    let _ = shutdown_tx.send(true);
    match gateway_task.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => eprintln!("issue bridge gateway exited with error: {error:#}"),
        Err(error) => eprintln!("issue bridge gateway task panicked: {error}"),
    }
    event_loop.abort();
    served
}
