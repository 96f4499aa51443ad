//! Harambee - a terminal client for tracking sacco contributions.
//!
//! Members sign up, log in, and view aggregate and personal contribution
//! totals; admin members record new transactions. All persistence and
//! authentication are owned by the hosted backend; this client fetches,
//! merges, and renders, and keeps enough cached locally to stay useful
//! offline.

mod app;
mod views;

use std::io::{self, Write};

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use harambee_core::aggregate::filter_by_name;
use harambee_core::auth::CredentialStore;
use harambee_core::cache::FetchOutcome;
use harambee_core::cache::ImageSource;

use app::App;
use views::{render_dashboard, render_table};

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("dashboard");

    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return Ok(());
    }

    info!(command, "Harambee starting");
    let mut app = App::new()?;

    match command {
        "login" => cmd_login(&mut app, &args).await,
        "signup" => cmd_signup(&mut app).await,
        "logout" => cmd_logout(&mut app).await,
        "whoami" => cmd_whoami(&mut app).await,
        "dashboard" => cmd_dashboard(&mut app).await,
        "transactions" => cmd_transactions(&mut app, &args).await,
        "record" => cmd_record(&mut app, &args).await,
        "refresh" => cmd_refresh(&mut app).await,
        "assets" => cmd_assets(&mut app, &args).await,
        "fetch" => cmd_fetch(&app, &args).await,
        "image" => cmd_image(&app, &args).await,
        other => {
            eprintln!("Unknown command: {}\n", other);
            print_usage();
            anyhow::bail!("unknown command")
        }
    }
}

fn print_usage() {
    println!("harambee - sacco contribution tracker\n");
    println!("USAGE: harambee [COMMAND]\n");
    println!("COMMANDS:");
    println!("  dashboard           Contribution overview (default)");
    println!("  transactions        List transactions [--mine] [--filter <name>]");
    println!("  record <id> <amt>   Record a contribution for a member (admin)");
    println!("  refresh             Re-fetch and re-merge all data");
    println!("  login [email]       Sign in");
    println!("  signup              Create an account");
    println!("  logout              Sign out and clear local state");
    println!("  whoami              Show the current session");
    println!("  assets <sub>        Asset cache: install | activate | status");
    println!("  fetch <url>         Fetch a shell asset (network first, cache fallback)");
    println!("  image <url>         Load an image (cache first, network fallback)");
    println!("\nBackend coordinates come from HARAMBEE_URL and HARAMBEE_ANON_KEY");
    println!("(or ~/.config/harambee/config.json). RUST_LOG controls logging.");
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_email(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    if input.is_empty() {
        if let Some(last) = last {
            return Ok(last.to_string());
        }
        anyhow::bail!("Email required");
    }
    Ok(input.to_string())
}

// ============================================================================
// Commands
// ============================================================================

async fn cmd_login(app: &mut App, args: &[String]) -> Result<()> {
    let email = match args.get(2) {
        Some(email) => email.clone(),
        None => {
            let last = app.config.last_email.clone();
            prompt_email(last.as_deref())?
        }
    };

    let password = if CredentialStore::has_credentials(&email) {
        print!("Use stored password? [Y/n]: ");
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if input.trim().to_lowercase() != "n" {
            CredentialStore::get_password(&email)?
        } else {
            rpassword::prompt_password("Password: ")?
        }
    } else {
        rpassword::prompt_password("Password: ")?
    };

    app.sign_in(&email, &password, true).await?;
    println!("Login successful.\n");

    warm_assets(app).await;
    show_dashboard(app).await
}

async fn cmd_signup(app: &mut App) -> Result<()> {
    let first_name = prompt_line("First Name")?;
    let last_name = prompt_line("Last Name")?;
    let email = prompt_email(None)?;
    let password = rpassword::prompt_password("Password: ")?;

    app.sign_up(&email, &password, &first_name, &last_name)
        .await?;
    println!("Account created.\n");

    warm_assets(app).await;
    show_dashboard(app).await
}

async fn cmd_logout(app: &mut App) -> Result<()> {
    app.sign_out().await?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_whoami(app: &mut App) -> Result<()> {
    match app.session.data.as_ref() {
        Some(data) if !data.is_expired() => {
            println!("{} <{}>", data.first_name, data.email);
            println!("Session expires in {}m", data.minutes_until_expiry());
            println!(
                "Data last fetched: {}",
                app.cache.get_cache_ages().last_updated()
            );
            // Confirm the token is still honored server-side.
            match app.api.fetch_user().await {
                Ok(profile) => println!("Session valid for {}", profile.email),
                Err(e) => println!("Session check failed: {}", e),
            }
            Ok(())
        }
        _ => {
            match app.store.get(harambee_core::store::keys::USER) {
                Some(user) => println!("Not signed in (last signed in as {}).", user),
                None => println!("Not signed in."),
            }
            Ok(())
        }
    }
}

async fn cmd_dashboard(app: &mut App) -> Result<()> {
    ensure_authenticated(app)?;
    show_dashboard(app).await
}

async fn cmd_transactions(app: &mut App, args: &[String]) -> Result<()> {
    ensure_authenticated(app)?;

    let mut mine_only = false;
    let mut filter: Option<String> = None;
    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--mine" => mine_only = true,
            "--filter" => {
                filter = Some(
                    rest.next()
                        .ok_or_else(|| anyhow::anyhow!("--filter requires a name"))?
                        .clone(),
                )
            }
            other => anyhow::bail!("Unknown option: {}", other),
        }
    }

    let (cached, fresh) = app.dashboard_data().await?;
    if !fresh {
        println!("(offline - showing data cached {})\n", cached.age_display());
    }
    let result = cached.data;

    // Non-admin viewers only ever see their own rows.
    let rows = if result.viewer_permission.is_admin() && !mine_only {
        result.enriched
    } else {
        result.own_only
    };

    let rows = match filter {
        Some(query) => filter_by_name(&rows, &query),
        None => rows,
    };
    render_table(&rows);
    Ok(())
}

async fn cmd_record(app: &mut App, args: &[String]) -> Result<()> {
    ensure_authenticated(app)?;

    let member_id: i64 = args
        .get(2)
        .ok_or_else(|| anyhow::anyhow!("Usage: harambee record <member-id> <amount>"))?
        .parse()
        .map_err(|_| anyhow::anyhow!("Member id must be a number"))?;
    let amount: Decimal = args
        .get(3)
        .ok_or_else(|| anyhow::anyhow!("Usage: harambee record <member-id> <amount>"))?
        .parse()
        .map_err(|_| anyhow::anyhow!("Amount must be a number"))?;

    let result = app.record(member_id, amount).await?;
    println!("Recorded.\n");
    render_dashboard(&result, &app.viewer_name(), None);
    Ok(())
}

async fn cmd_refresh(app: &mut App) -> Result<()> {
    ensure_authenticated(app)?;
    let result = app.refresh().await?;
    println!(
        "Refreshed: {} transactions from {} contributors.",
        result.enriched.len(),
        result.totals.unique_contributors
    );
    Ok(())
}

async fn cmd_assets(app: &mut App, args: &[String]) -> Result<()> {
    let sub = args.get(2).map(String::as_str).unwrap_or("status");
    let mut assets = app.asset_cache()?;

    match sub {
        "install" => {
            let urls = app.config.shell_assets.clone();
            if urls.is_empty() {
                println!("No shell assets configured (config.json: shell_assets).");
                return Ok(());
            }
            let cached = assets.install(&urls).await?;
            println!(
                "Cached {}/{} assets into generation {}.",
                cached,
                urls.len(),
                assets.generation()
            );
            Ok(())
        }
        "activate" => {
            assets.activate()?;
            println!(
                "Generation {} active; caches on disk: {:?}",
                assets.generation(),
                assets.cache_names()?
            );
            Ok(())
        }
        "status" => {
            println!("Configured generation: {}", assets.generation());
            println!("Caches on disk: {:?}", assets.cache_names()?);
            Ok(())
        }
        other => anyhow::bail!("Unknown assets subcommand: {}", other),
    }
}

async fn cmd_fetch(app: &App, args: &[String]) -> Result<()> {
    let url = args
        .get(2)
        .ok_or_else(|| anyhow::anyhow!("Usage: harambee fetch <url>"))?;
    let assets = app.asset_cache()?;

    match assets.fetch_shell("GET", url).await? {
        FetchOutcome::Network(response) => {
            println!(
                "{} bytes from network (status {}, cached for offline use)",
                response.body.len(),
                response.status
            );
        }
        FetchOutcome::Cached(body) => {
            println!("{} bytes served from cache (network unreachable)", body.len());
        }
        FetchOutcome::Offline(_) => {
            println!("Network unreachable and not cached - offline page served.");
        }
    }
    Ok(())
}

async fn cmd_image(app: &App, args: &[String]) -> Result<()> {
    let url = args
        .get(2)
        .ok_or_else(|| anyhow::anyhow!("Usage: harambee image <url>"))?;
    let assets = app.asset_cache()?;

    match assets.load_image(url).await {
        ImageSource::Local(path) => println!("{}", path.display()),
        ImageSource::Remote(url) => println!("(not cached) {}", url),
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn ensure_authenticated(app: &App) -> Result<()> {
    if !app.is_authenticated() {
        anyhow::bail!("Not signed in - run `harambee login`");
    }
    Ok(())
}

async fn show_dashboard(app: &mut App) -> Result<()> {
    let (cached, fresh) = app.dashboard_data().await?;
    let age = (!fresh).then(|| cached.age_display());
    render_dashboard(&cached.data, &app.viewer_name(), age.as_deref());
    Ok(())
}

/// Opportunistically warm and activate the asset cache after sign-in.
/// Failures are logged, never fatal.
async fn warm_assets(app: &mut App) {
    if app.config.shell_assets.is_empty() {
        return;
    }
    let urls = app.config.shell_assets.clone();
    match app.asset_cache() {
        Ok(mut assets) => {
            if let Err(e) = assets.install(&urls).await {
                warn!(error = %e, "Asset warm cache failed");
                return;
            }
            if let Err(e) = assets.activate() {
                warn!(error = %e, "Asset cache activation failed");
            }
        }
        Err(e) => warn!(error = %e, "Asset cache unavailable"),
    }
}
