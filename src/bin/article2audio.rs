//! CLI binary for article2audio.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ClientConfig` and prints results.

use anyhow::{Context, Result};
use article2audio::{
    convert, sign_in, sign_out, Article2AudioError, AudioFile, ClientConfig, Countdown, HttpApi,
    Phase, ProgressCallback, SessionFailure, SessionId, SessionProgressCallback, TokenStore,
    DEFAULT_BASE_URL,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

/// Decorations go to stderr; plain text when it is redirected or `NO_COLOR` is set.
static COLOUR: Lazy<bool> =
    Lazy::new(|| io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none());

fn paint(code: &str, s: &str) -> String {
    ansi(*COLOUR, code, s)
}

fn ansi(enabled: bool, code: &str, s: &str) -> String {
    if enabled {
        format!("\x1b[{code}m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn green(s: &str) -> String {
    paint("32", s)
}
fn red(s: &str) -> String {
    paint("31", s)
}
fn dim(s: &str) -> String {
    paint("2", s)
}
fn bold(s: &str) -> String {
    paint("1", s)
}
fn cyan(s: &str) -> String {
    paint("36", s)
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a single spinner line showing the current
/// phase, with the advisory countdown appended while audio is created.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Idle");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl SessionProgressCallback for CliProgressCallback {
    fn on_submit_start(&self, _session: SessionId, url: &str) {
        self.bar.set_prefix("Submitting");
        self.bar.set_message(dim(url));
    }

    fn on_submitted(&self, _session: SessionId, task_id: &str, estimated_secs: u64) {
        self.bar.println(format!(
            "{} {}  {}",
            cyan("◆"),
            bold(&format!("Job {task_id} accepted")),
            dim(&format!("estimated {estimated_secs}s")),
        ));
        self.bar.set_prefix("Processing");
        self.bar.set_message(String::new());
    }

    fn on_status(&self, _session: SessionId, phase: &Phase) {
        if phase.is_terminal() {
            return;
        }
        self.bar.set_prefix("Status");
        self.bar.set_message(phase.label().to_string());
    }

    fn on_countdown(&self, _session: SessionId, remaining_secs: u64) {
        self.bar.set_prefix("Creating audio");
        self.bar.set_message(format!(
            "estimated time remaining: {}",
            Countdown::seeded(remaining_secs)
        ));
    }

    fn on_completed(&self, _session: SessionId, task_id: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} Job {} completed", green("✔"), bold(task_id));
    }

    fn on_failed(&self, _session: SessionId, failure: &SessionFailure) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), red(&failure.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Sign in once with a token from the identity provider
  article2audio login --token eyJhbGciOi...

  # Turn an article into audio and wait for it
  article2audio convert https://example.substack.com/p/some-post

  # List your audio files, newest first
  article2audio list

  # Download one of them into ./audio
  article2audio download 42 -o audio

  # Podcast feed URL for your player
  article2audio feed

ENVIRONMENT VARIABLES:
  ARTICLE2AUDIO_API_URL       Service base URL (default http://localhost:8001/api)
  ARTICLE2AUDIO_TOKEN_FILE    Where the bearer token is stored
  ARTICLE2AUDIO_TOKEN         Token for `login` when --token is omitted
  RUST_LOG                    Override the log filter
"#;

/// Turn written articles into audio files and a podcast feed.
#[derive(Parser, Debug)]
#[command(
    name = "article2audio",
    version,
    about = "Turn written articles into audio files and a podcast feed",
    long_about = "Submit article URLs to an article-to-audio service, follow the conversion \
until the audio file is ready, then list, download or subscribe to the results.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Service base URL.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Bearer token file (default: <config dir>/article2audio/token).
    #[arg(long, global = true, env = "ARTICLE2AUDIO_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_JSON")]
    json: bool,

    /// Disable the live progress display.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ARTICLE2AUDIO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ARTICLE2AUDIO_QUIET")]
    quiet: bool,

    /// Per-request timeout in seconds.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout: u64,

    /// Audio download timeout in seconds.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_DOWNLOAD_TIMEOUT", default_value_t = 300)]
    download_timeout: u64,

    /// Delay between status polls in milliseconds.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_POLL_INTERVAL_MS", default_value_t = 5000)]
    poll_interval_ms: u64,

    /// Extra attempts for a transiently failing status poll.
    #[arg(long, global = true, env = "ARTICLE2AUDIO_POLL_RETRIES", default_value_t = 0)]
    poll_retries: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit an article URL and wait until its audio file is ready.
    Convert {
        /// HTTP/HTTPS URL of the article.
        url: String,
    },
    /// List your audio files, newest first.
    List,
    /// Download an audio file by id.
    Download {
        /// Audio file id as shown by `list`.
        id: String,
        /// Directory to save into.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Print your podcast feed URL.
    Feed,
    /// Verify a bearer token and store it.
    Login {
        /// Token issued by the identity provider.
        #[arg(long, env = "ARTICLE2AUDIO_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Forget the stored token.
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already shows what the library would log at INFO.
    let show_progress = matches!(cli.command, Command::Convert { .. })
        && !cli.quiet
        && !cli.no_progress
        && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let token_path = cli.token_file.clone().unwrap_or_else(TokenStore::default_path);
    let store = TokenStore::init_global(token_path).context("Failed to load stored token")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SessionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let result = run(&cli, &config, store).await;
    if let Err(ref e) = result {
        forget_rejected_token(store, e);
    }
    result
}

async fn run(cli: &Cli, config: &ClientConfig, store: &TokenStore) -> Result<()> {
    match &cli.command {
        Command::Convert { url } => {
            let outcome = convert(url, config, store.current())
                .await
                .context("Conversion failed")?;

            if cli.json {
                let json =
                    serde_json::to_string_pretty(&outcome).context("Failed to serialise output")?;
                println!("{json}");
            } else {
                println!("{}", outcome.task_id);
                if !cli.quiet {
                    eprintln!(
                        "   {} polls  /  {}ms total",
                        dim(&outcome.polls.to_string()),
                        outcome.elapsed_ms,
                    );
                }
            }
        }

        Command::List => {
            let api = HttpApi::new(config, store.current())?;
            let mut files = api
                .list_audio_files()
                .await
                .context("Failed to list audio files")?;
            sort_newest_first(&mut files);

            if cli.json {
                let json =
                    serde_json::to_string_pretty(&files).context("Failed to serialise output")?;
                println!("{json}");
            } else if files.is_empty() {
                if !cli.quiet {
                    eprintln!("No audio files yet.");
                }
            } else {
                for f in &files {
                    let created = f
                        .created_at()
                        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| f.creation_date.clone());
                    let created = if io::stdout().is_terminal() {
                        dim(&created)
                    } else {
                        created
                    };
                    println!("{:>6}  {}  {}", f.id, created, f.file_name);
                }
            }
        }

        Command::Download { id, output_dir } => {
            let api = HttpApi::new(config, store.current())?;
            let result = if cli.quiet || cli.no_progress {
                api.download(id, output_dir, None).await
            } else {
                let bar = download_bar();
                let progress = bar.clone();
                let on_progress = move |downloaded: u64, total: Option<u64>| {
                    if let Some(t) = total {
                        if progress.length() != Some(t) {
                            progress.set_length(t);
                        }
                    }
                    progress.set_position(downloaded);
                };
                let result = api.download(id, output_dir, Some(&on_progress)).await;
                bar.finish_and_clear();
                result
            };
            let path = result.with_context(|| format!("Failed to download audio file {id}"))?;

            if cli.json {
                println!("{}", serde_json::json!({ "id": id, "path": path }));
            } else {
                if !cli.quiet {
                    eprint!("{} ", green("✔"));
                }
                println!("{}", path.display());
            }
        }

        Command::Feed => {
            let api = HttpApi::new(config, store.current())?;
            let url = api.feed_url().await.context("Failed to fetch feed URL")?;
            if cli.json {
                println!("{}", serde_json::json!({ "feed_url": url }));
            } else {
                println!("{url}");
            }
        }

        Command::Login { token } => {
            let user = sign_in(config, store, token)
                .await
                .context("Sign-in failed")?;
            if cli.json {
                let json =
                    serde_json::to_string_pretty(&user).context("Failed to serialise output")?;
                println!("{json}");
            } else if !cli.quiet {
                eprintln!(
                    "{} Signed in as {}{}",
                    green("✔"),
                    bold(&user.userid),
                    user.email
                        .as_deref()
                        .map(|e| format!(" {}", dim(&format!("<{e}>"))))
                        .unwrap_or_default(),
                );
                eprintln!("   token stored in {}", dim(&store.path().display().to_string()));
            }
        }

        Command::Logout => {
            sign_out(store).context("Failed to remove stored token")?;
            if !cli.quiet {
                eprintln!("{} Signed out", green("✔"));
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ClientConfig> {
    let mut builder = ClientConfig::builder()
        .base_url(&cli.api_url)
        .request_timeout_secs(cli.request_timeout)
        .download_timeout_secs(cli.download_timeout)
        .poll_interval_ms(cli.poll_interval_ms)
        .poll_retries(cli.poll_retries);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// A stored token the service refuses is useless on later runs too.
fn forget_rejected_token(store: &TokenStore, err: &anyhow::Error) {
    let rejected = err
        .downcast_ref::<Article2AudioError>()
        .is_some_and(Article2AudioError::is_unauthorized);
    if rejected && store.is_signed_in() {
        if let Err(e) = store.clear() {
            tracing::warn!("Could not clear rejected token: {}", e);
        }
    }
}

fn sort_newest_first(files: &mut [AudioFile]) {
    files.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}

fn download_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("Downloading");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}
