//! Example: Poll the foreground app and print changes.
//!
//! Run with: cargo run -p veil-context --example poll_context

use std::sync::{Arc, Mutex};
use std::time::Duration;
use veil_context::{
    platform::PlatformProvider, AppId, ForegroundPoller, PollCadence, PollerOptions,
    UsageForegroundSource, DEFAULT_QUERY_TIMEOUT,
};

#[tokio::main]
async fn main() {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter("veil_context=debug")
        .init();

    println!("=== Foreground Poller Example ===");
    println!("Switch between apps to see foreground changes.\n");

    let source = Arc::new(UsageForegroundSource::new(PlatformProvider::new()));
    let last: Arc<Mutex<Option<AppId>>> = Arc::new(Mutex::new(None));

    let mut poller = ForegroundPoller::new();
    poller.start(
        source,
        Arc::new(move |app| {
            let Ok(mut last) = last.lock() else {
                return;
            };
            if app.is_some() && *last != app {
                println!(
                    "[{}] foreground: {}",
                    chrono::Local::now().format("%H:%M:%S"),
                    app.as_ref().map(AppId::as_str).unwrap_or("(none)")
                );
                *last = app;
            }
        }),
        PollerOptions::from_cadence(PollCadence::Degraded, DEFAULT_QUERY_TIMEOUT),
    );

    // Run for 30 seconds
    println!("Running for 30 seconds... (Ctrl+C to stop)\n");
    tokio::time::sleep(Duration::from_secs(30)).await;

    poller.stop().await;
    println!("\nDone.");
}
