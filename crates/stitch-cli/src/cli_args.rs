use clap::Parser;

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "stitch",
    about = "Bidirectional mirror between a Discord forum channel and GitHub issues",
    version
)]
pub struct Cli {
    #[arg(long, env = "STITCH_DISCORD_TOKEN", help = "Discord bot token.")]
    pub discord_token: String,

    #[arg(
        long,
        env = "STITCH_DISCORD_API_BASE",
        default_value = "https://discord.com/api/v10",
        help = "Discord REST API base URL."
    )]
    pub discord_api_base: String,

    #[arg(
        long,
        env = "STITCH_DISCORD_GATEWAY_URL",
        default_value = "wss://gateway.discord.gg/?v=10&encoding=json",
        help = "Discord gateway websocket URL."
    )]
    pub discord_gateway_url: String,

    #[arg(
        long,
        env = "STITCH_GUILD_ID",
        value_parser = parse_positive_u64,
        help = "Guild the monitored forum channel belongs to."
    )]
    pub guild_id: u64,

    #[arg(
        long,
        env = "STITCH_FORUM_CHANNEL_ID",
        help = "Forum channel whose threads are mirrored as issues."
    )]
    pub forum_channel_id: String,

    #[arg(long, env = "STITCH_GITHUB_TOKEN", help = "GitHub API token.")]
    pub github_token: String,

    #[arg(
        long,
        env = "STITCH_GITHUB_API_BASE",
        default_value = "https://api.github.com",
        help = "GitHub REST API base URL."
    )]
    pub github_api_base: String,

    #[arg(
        long,
        env = "STITCH_GITHUB_REPO",
        help = "Repository in owner/repo format."
    )]
    pub github_repo: String,

    #[arg(
        long,
        env = "STITCH_WEBHOOK_BIND",
        default_value = "127.0.0.1:8787",
        help = "Bind address for the GitHub webhook receiver."
    )]
    pub webhook_bind: String,

    #[arg(
        long,
        env = "STITCH_WEBHOOK_SECRET",
        help = "Shared secret webhook deliveries must present; omit to accept unauthenticated deliveries."
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long,
        env = "STITCH_HTTP_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = parse_positive_u64,
        help = "Per-request timeout for both platform REST clients."
    )]
    pub http_timeout_ms: u64,

    #[arg(
        long,
        env = "STITCH_ARCHIVE_DEBOUNCE_MS",
        default_value_t = 500,
        value_parser = parse_positive_u64,
        help = "Delay before an archive-state change is propagated; absorbs Discord's lock/archive bursts."
    )]
    pub archive_debounce_ms: u64,

    #[arg(
        long,
        env = "STITCH_ASSIGNMENT_TTL_MS",
        default_value_t = 300_000,
        value_parser = parse_positive_u64,
        help = "How long a pending assignee selection stays valid."
    )]
    pub assignment_ttl_ms: u64,

    #[arg(
        long,
        env = "STITCH_GATEWAY_RECONNECT_DELAY_MS",
        default_value_t = 5_000,
        value_parser = parse_positive_u64,
        help = "Delay before reconnecting after a gateway session error."
    )]
    pub gateway_reconnect_delay_ms: u64,

    #[arg(long, help = "Run the reconciliation pass against the tracker and exit.")]
    pub reconcile_once: bool,
}
