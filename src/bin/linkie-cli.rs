//! Linkie CLI (test harness)
//!
//! Non-interactive CLI for exercising the client core against a live
//! backend: signs in, connects the change feed, loads the first feed page
//! and then prints everything pushed over the channels.

use anyhow::Result;
use clap::Parser;
use linkie_sdk_core::social::auth::AuthListener;
use linkie_sdk_core::social::notification::NotificationListener;
use linkie_sdk_core::social::post::FeedListener;
use linkie_sdk_core::social::types::{ChannelSpec, EventFilter};
use linkie_sdk_core::{ClientConfig, LinkieClient};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// Linkie CLI client
#[derive(Parser, Debug)]
#[command(name = "linkie-cli")]
#[command(about = "Linkie CLI client for exercising the SDK core", long_about = None)]
struct Args {
    /// Backend base URL
    #[arg(long, default_value = "http://localhost:54321")]
    base_url: String,

    /// Project API key
    #[arg(long, env = "LINKIE_API_KEY")]
    api_key: String,

    /// Account email
    #[arg(short, long)]
    email: String,

    /// Account password
    #[arg(short, long, env = "LINKIE_PASSWORD")]
    password: String,

    /// Run duration in seconds, 0 runs until interrupted
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Log level
    #[arg(long, default_value = "info,linkie_sdk_core=debug")]
    log_level: String,
}

/// Log to stdout and to a file at the same time.
fn init_logger(log_level: &str) {
    use std::fs::OpenOptions;
    use std::io;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    // RUST_LOG wins over the command-line level when set
    let filter_layer =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("failed to open debug.log");

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("[CLI] logging to console and debug.log");
}

fn setup_listeners(client: &LinkieClient) {
    struct CliAuthListener;
    #[async_trait::async_trait]
    impl AuthListener for CliAuthListener {
        async fn on_signed_in(&self, session_json: String) {
            info!("[CLI/Auth] signed in: {}", session_json);
        }

        async fn on_signed_out(&self) {
            info!("[CLI/Auth] signed out");
        }

        async fn on_user_updated(&self, user_json: String) {
            info!("[CLI/Auth] profile updated: {}", user_json);
        }
    }
    client.session.set_listener(Arc::new(CliAuthListener));

    struct CliFeedListener;
    #[async_trait::async_trait]
    impl FeedListener for CliFeedListener {
        async fn on_feed_changed(&self, posts_json: String) {
            info!("[CLI/Feed] feed changed: {}", posts_json);
        }

        async fn on_post_removed(&self, post_id: i64) {
            info!("[CLI/Feed] post removed: {}", post_id);
        }

        async fn on_has_more_changed(&self, has_more: bool) {
            info!("[CLI/Feed] has more: {}", has_more);
        }
    }
    client.feed.set_listener(Arc::new(CliFeedListener));

    struct CliNotificationListener;
    #[async_trait::async_trait]
    impl NotificationListener for CliNotificationListener {
        async fn on_new_notification(&self, notification_json: String) {
            info!("[CLI/Notif] new notification: {}", notification_json);
        }

        async fn on_badge_changed(&self, count: i32) {
            info!("[CLI/Notif] badge: {}", count);
        }
    }
    client.badge.set_listener(Arc::new(CliNotificationListener));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(&args.log_level);

    info!("[CLI] Linkie CLI client (test mode)");
    info!("[CLI] backend: {}", args.base_url);
    info!("[CLI] duration: {} seconds (0 = run forever)", args.duration);

    let config = ClientConfig::new(args.base_url, args.api_key);
    let mut client = LinkieClient::new(config)?;
    setup_listeners(&client);

    info!("[CLI] signing in as {}...", args.email);
    client
        .sign_in(&args.email, &args.password)
        .await
        .map_err(|e| anyhow::anyhow!("sign in failed: {}", e))?;
    let user_id = client
        .session
        .user_id()
        .ok_or_else(|| anyhow::anyhow!("no session after sign in"))?;
    info!("[CLI] signed in, user id: {}", user_id);

    info!("[CLI] connecting change feed...");
    client
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("connect failed: {}", e))?;

    // home-screen channels: every post change, own notifications only
    client
        .subscribe(
            ChannelSpec::table(EventFilter::All, "posts"),
            client.feed.clone(),
        )
        .await?;
    let notification_spec = ChannelSpec::table(EventFilter::Insert, "notifications")
        .with_filter(format!("receiver_id=eq.{}", user_id));
    client
        .subscribe(notification_spec, client.badge.clone())
        .await?;
    info!("[CLI] channels joined");

    if let Err(e) = client.feed.load_more().await {
        error!("[CLI] initial feed load failed: {}", e);
    } else {
        info!("[CLI] feed loaded, {} post(s)", client.feed.len());
        for post in client.feed.snapshot().iter().take(5) {
            let author = post
                .user
                .as_ref()
                .map(|u| u.name.as_str())
                .unwrap_or("<unknown>");
            info!(
                "[CLI]   #{} by {} | {} like(s), {} comment(s)",
                post.id,
                author,
                post.post_likes.len(),
                post.comment_count()
            );
        }
    }

    match client.notifications.fetch_notifications(&user_id).await {
        Ok(rows) => info!("[CLI] {} stored notification(s)", rows.len()),
        Err(e) => error!("[CLI] fetch notifications failed: {}", e),
    }

    info!("[CLI] listening for pushed changes...");
    if args.duration > 0 {
        info!("[CLI] exiting after {} seconds", args.duration);
        sleep(Duration::from_secs(args.duration)).await;
        info!("[CLI] done");
    } else {
        info!("[CLI] running until Ctrl+C");
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    Ok(())
}
