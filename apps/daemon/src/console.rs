//! Line-oriented stdin console.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use veil_context::AppId;
use veil_engine::ProtectionService;

/// One console line.
#[derive(Parser, Debug)]
#[command(name = "veil", no_binary_name = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add apps to the protected set
    Protect {
        #[arg(required = true)]
        apps: Vec<AppId>,
    },
    /// Remove apps from the protected set
    Unprotect {
        #[arg(required = true)]
        apps: Vec<AppId>,
    },
    /// Replace the unlock pattern (quadrant codes, space or comma separated)
    Pattern {
        #[arg(required = true, value_delimiter = ',', allow_negative_numbers = true)]
        codes: Vec<i64>,
    },
    /// Feed one raw tap code to the cover
    Tap { code: u8 },
    /// Report a foreground change, as an accessibility source would
    Push { app: AppId },
    /// Simulate the screen turning off
    ScreenOff,
    /// Simulate the screen turning on
    ScreenOn,
    /// Start protection
    Enable,
    /// Stop protection
    Disable,
    /// Show engine state and policy
    Status,
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

/// Parse one console line. `Ok(None)` for blank lines.
pub fn parse(line: &str) -> Result<Option<Command>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    ConsoleLine::try_parse_from(words).map(|line| Some(line.command))
}

/// Read commands until EOF or `quit`.
pub async fn run(service: &ProtectionService) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("type `help` for commands");

    while let Some(line) = lines.next_line().await? {
        let command = match parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                // Also covers `help`, which clap reports as an error kind.
                println!("{}", e.render());
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = execute(service, command).await {
            println!("error: {e:#}");
        }
    }
    Ok(())
}

async fn execute(service: &ProtectionService, command: Command) -> Result<()> {
    match command {
        Command::Protect { apps } => {
            let mut current = service.get_protected_apps()?;
            current.extend(apps);
            service.save_protected_apps(current).await?;
        }
        Command::Unprotect { apps } => {
            let mut current = service.get_protected_apps()?;
            current.retain(|a| !apps.contains(a));
            service.save_protected_apps(current).await?;
        }
        Command::Pattern { codes } => service.save_secret_pattern(codes)?,
        Command::Tap { code } => with_engine(service, |h| h.tap(code)).await,
        Command::Push { app } => with_engine(service, |h| h.push_foreground(app)).await,
        Command::ScreenOff => with_engine(service, |h| h.screen_off()).await,
        Command::ScreenOn => with_engine(service, |h| h.screen_on()).await,
        Command::Enable => {
            if !service.enable_protection().await? {
                println!("permissions missing: {:?}", service.check_permissions());
            }
        }
        Command::Disable => {
            service.disable_protection().await;
        }
        Command::Status => print_status(service).await?,
        Command::Quit => {}
    }
    Ok(())
}

async fn with_engine<F>(service: &ProtectionService, f: F)
where
    F: FnOnce(&veil_engine::EngineHandle) -> bool,
{
    match service.handle().await {
        Some(handle) => {
            f(&handle);
        }
        None => println!("protection is not active"),
    }
}

async fn print_status(service: &ProtectionService) -> Result<()> {
    let state = match service.handle().await {
        Some(handle) => serde_json::to_string(&handle.state().await?)?,
        None => "inactive".to_string(),
    };
    let apps: Vec<String> = service
        .get_protected_apps()?
        .into_iter()
        .map(AppId::into_string)
        .collect();
    println!("state:     {state}");
    println!("protected: {}", apps.join(", "));
    println!("pattern:   {:?}", service.get_secret_pattern()?);
    println!("cover:     {}", service.is_cover_shown().await);
    Ok(())
}
