//! CLI binary for deckalt.
//!
//! A thin shim over the library crate that maps subcommands and flags to
//! the operations in `deckalt::ops` and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use deckalt::{ops, CaptionConfig, CaptionProgressCallback, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per image. The
/// run is strictly sequential, so no out-of-order bookkeeping is needed.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} images  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Captioning");
        Arc::new(Self { bar })
    }
}

impl CaptionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_images: usize) {
        self.bar.set_length(total_images as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Captioning {total_images} images…"))
        ));
    }

    fn on_image_start(&self, _index: usize, _total: usize, file_name: &str) {
        self.bar.set_message(file_name.to_string());
    }

    fn on_image_complete(&self, _index: usize, _total: usize, file_name: &str, caption: &str) {
        let shown = if caption.is_empty() {
            dim("(no caption returned)")
        } else {
            format!("\"{caption}\"")
        };
        self.bar
            .println(format!("  {} {:<26} {}", green("✓"), file_name, shown));
        self.bar.inc(1);
    }

    fn on_image_error(&self, _index: usize, _total: usize, file_name: &str, error: &str) {
        let msg = truncate_message(error, 80);
        self.bar
            .println(format!("  {} {:<26} {}", red("✗"), file_name, red(&msg)));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_images: usize, success_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} images captioned",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} images captioned  ({} failed)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

/// Cap a log message at `max` characters, counting chars rather than bytes
/// so endpoint error bodies in any language cannot split a code point.
fn truncate_message(message: &str, max: usize) -> String {
    if message.chars().count() > max {
        let mut out: String = message.chars().take(max - 1).collect();
        out.push('\u{2026}');
        out
    } else {
        message.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract every picture into a directory next to the deck
  deckalt extract q3_review.pptx --out-dir q3_images

  # Caption everything the ledger doesn't cover yet
  export DECKALT_ACCESS_TOKEN=$(gcloud auth print-access-token)
  deckalt caption-dir q3_images --project my-gcp-project

  # See what a run would cost before starting it
  deckalt missing q3_images

  # Caption one image without touching the ledger
  deckalt caption q3_images/image_pg0_idx1.png --project my-gcp-project --no-ledger

  # Review q3_images/captions.csv in a spreadsheet, then write it back
  deckalt apply q3_review.pptx --ledger q3_images/captions.csv -o q3_review_alt.pptx

  # Inspect the alt-text currently in a deck
  deckalt list q3_review.pptx

  # Wipe all alt-text (writes over the input unless -o is given)
  deckalt reset q3_review.pptx

TYPICAL WORKFLOW:
  1. extract      deck → image_pg<slide>_idx<shape>.<ext> files
  2. caption-dir  one predict call per image, captions appended to the CSV
  3. (review)     edit the CSV by hand — it is the source of truth
  4. apply        CSV → alt-text in the deck

  The positional file name is the only thing correlating disk, CSV, and
  deck. Do not reorder slides between extract and apply.

ENVIRONMENT VARIABLES:
  DECKALT_ACCESS_TOKEN   OAuth2 bearer token (gcloud auth print-access-token)
  DECKALT_PROJECT        Google Cloud project ID
  RUST_LOG               Log filter (overrides -v / -q)
"#;

/// Auto-generate accessibility alt-text for the images in PowerPoint decks.
#[derive(Parser, Debug)]
#[command(
    name = "deckalt",
    version,
    about = "Auto-generate accessibility alt-text for the images in PowerPoint decks",
    long_about = "Extract the images from a .pptx, caption them with Google Vertex AI's \
imagetext model, keep the captions in a reviewable CSV ledger, and write the approved \
captions back into the deck as alt-text.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging (debug level).
    #[arg(short, long, global = true, env = "DECKALT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DECKALT_QUIET")]
    quiet: bool,

    /// Disable the progress bar (log lines only).
    #[arg(long, global = true, env = "DECKALT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract every picture-shape image from a deck into a directory.
    Extract {
        /// Path to the .pptx file.
        pptx: PathBuf,

        /// Directory to write images into (created if missing).
        #[arg(long, default_value = "deck_images")]
        out_dir: PathBuf,
    },

    /// Caption a single image file.
    Caption {
        /// Path to the image file.
        image: PathBuf,

        /// Ledger CSV to append the caption to.
        #[arg(long, default_value = "captions.csv")]
        ledger: PathBuf,

        /// Print the caption without recording it in the ledger.
        #[arg(long)]
        no_ledger: bool,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// Caption every not-yet-ledgered image in a directory.
    CaptionDir {
        /// Directory of extracted images.
        dir: PathBuf,

        /// Ledger CSV (defaults to captions.csv inside the directory).
        #[arg(long)]
        ledger: Option<PathBuf>,

        #[command(flatten)]
        endpoint: EndpointArgs,
    },

    /// List the image files a captioning run would still have to pay for.
    Missing {
        /// Directory of extracted images.
        dir: PathBuf,

        /// Ledger CSV (defaults to captions.csv inside the directory).
        #[arg(long)]
        ledger: Option<PathBuf>,
    },

    /// Write ledgered captions into the deck's picture alt-text.
    Apply {
        /// Path to the .pptx file.
        pptx: PathBuf,

        /// Ledger CSV with (fileName, caption) rows.
        #[arg(long, default_value = "captions.csv")]
        ledger: PathBuf,

        /// Write the result here instead of over the input deck.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the current alt-text of every picture in a deck.
    List {
        /// Path to the .pptx file.
        pptx: PathBuf,
    },

    /// Clear the alt-text of every picture in a deck.
    Reset {
        /// Path to the .pptx file.
        pptx: PathBuf,

        /// Write the result here instead of over the input deck.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the one-page upload form.
    #[cfg(feature = "web")]
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
    },
}

/// Flags shared by the captioning subcommands.
#[derive(Args, Debug)]
struct EndpointArgs {
    /// Google Cloud project ID.
    #[arg(long, env = "DECKALT_PROJECT")]
    project: Option<String>,

    /// Endpoint location/region.
    #[arg(long, env = "DECKALT_LOCATION", default_value = "us-central1")]
    location: String,

    /// OAuth2 bearer token (gcloud auth print-access-token).
    #[arg(long, env = "DECKALT_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// BCP-47 language code for the generated captions.
    #[arg(long, default_value = "en")]
    language: String,

    /// Delay between successive requests, in milliseconds.
    #[arg(long, default_value_t = deckalt::config::DEFAULT_REQUEST_DELAY_MS)]
    request_delay_ms: u64,

    /// Delay before retrying a rate-limited request, in milliseconds.
    #[arg(long, default_value_t = deckalt::config::DEFAULT_RETRY_DELAY_MS)]
    retry_delay_ms: u64,

    /// Retry budget per image for HTTP 429 responses.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// POST to this URL instead of the derived Vertex AI endpoint.
    #[arg(long, hide = true)]
    endpoint_override: Option<String>,
}

impl EndpointArgs {
    fn into_config(self, progress: Option<ProgressCallback>) -> Result<CaptionConfig> {
        let mut builder = CaptionConfig::builder()
            .location(self.location)
            .language(self.language)
            .request_delay_ms(self.request_delay_ms)
            .retry_delay_ms(self.retry_delay_ms)
            .max_retries(self.max_retries)
            .api_timeout_secs(self.api_timeout);
        if let Some(project) = self.project {
            builder = builder.project(project);
        }
        if let Some(token) = self.token {
            builder = builder.access_token(token);
        }
        if let Some(url) = self.endpoint_override {
            builder = builder.endpoint_override(url);
        }
        if let Some(cb) = progress {
            builder = builder.progress_callback(cb);
        }
        builder.build().context("Invalid captioning configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    match cli.command {
        Command::Extract { pptx, out_dir } => {
            let extracted = ops::extract_images(&pptx, &out_dir)
                .with_context(|| format!("Extracting from '{}'", pptx.display()))?;
            if !cli.quiet {
                for image in &extracted {
                    if image.written {
                        println!("  {} {}", green("✓"), image.file_name);
                    } else {
                        println!("  {} {}  {}", dim("·"), image.file_name, dim("(exists)"));
                    }
                }
                let new = extracted.iter().filter(|e| e.written).count();
                eprintln!(
                    "{} {} images ({} new) in '{}'",
                    green("✔"),
                    bold(&extracted.len().to_string()),
                    new,
                    out_dir.display()
                );
            }
        }

        Command::Caption {
            image,
            ledger,
            no_ledger,
            endpoint,
        } => {
            let config = endpoint.into_config(None)?;
            let ledger_path = (!no_ledger).then_some(ledger.as_path());
            let caption = ops::caption_file(&image, ledger_path, &config)
                .await
                .with_context(|| format!("Captioning '{}'", image.display()))?;
            println!("{caption}");
            if !cli.quiet {
                if let Some(path) = ledger_path {
                    eprintln!("{} recorded in '{}'", green("✔"), path.display());
                }
            }
        }

        Command::CaptionDir {
            dir,
            ledger,
            endpoint,
        } => {
            let ledger_path = ledger.unwrap_or_else(|| dir.join("captions.csv"));
            let progress: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new())
            } else {
                None
            };
            let config = endpoint.into_config(progress)?;
            let summary = ops::caption_directory(&dir, &ledger_path, &config)
                .await
                .with_context(|| format!("Captioning directory '{}'", dir.display()))?;
            if !cli.quiet && summary.outcomes.is_empty() {
                eprintln!(
                    "{} nothing to do: all {} images already in '{}'",
                    green("✔"),
                    summary.already_recorded,
                    ledger_path.display()
                );
            }
            if summary.failure_count() > 0 {
                std::process::exit(1);
            }
        }

        Command::Missing { dir, ledger } => {
            let ledger_path = ledger.unwrap_or_else(|| dir.join("captions.csv"));
            let missing = ops::missing_captions(&dir, &ledger_path)?;
            for name in &missing {
                println!("{name}");
            }
            if !cli.quiet {
                eprintln!(
                    "{} {} images not yet in '{}'",
                    cyan("◆"),
                    bold(&missing.len().to_string()),
                    ledger_path.display()
                );
            }
        }

        Command::Apply {
            pptx,
            ledger,
            output,
        } => {
            let applied = ops::apply_captions(&pptx, &ledger, output.as_deref())
                .with_context(|| format!("Applying captions to '{}'", pptx.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} alt-text written for {} pictures in '{}'",
                    green("✔"),
                    bold(&applied.to_string()),
                    output.as_deref().unwrap_or(&pptx).display()
                );
            }
        }

        Command::List { pptx } => {
            let entries = ops::list_alt_text(&pptx)?;
            for entry in &entries {
                let file = entry.file_name.as_deref().unwrap_or("-");
                let alt = if entry.alt_text.is_empty() {
                    dim("(empty)")
                } else {
                    format!("\"{}\"", entry.alt_text)
                };
                println!(
                    "slide {:>3}  shape {:>2}  {:<26} {}",
                    entry.slide_index, entry.shape_index, file, alt
                );
            }
            if !cli.quiet {
                let empty = entries.iter().filter(|e| e.alt_text.is_empty()).count();
                eprintln!(
                    "{} {} pictures, {} without alt-text",
                    cyan("◆"),
                    bold(&entries.len().to_string()),
                    empty
                );
            }
        }

        Command::Reset { pptx, output } => {
            let cleared = ops::reset_alt_text(&pptx, output.as_deref())
                .with_context(|| format!("Resetting alt-text in '{}'", pptx.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} alt-text cleared on {} pictures in '{}'",
                    green("✔"),
                    bold(&cleared.to_string()),
                    output.as_deref().unwrap_or(&pptx).display()
                );
            }
        }

        #[cfg(feature = "web")]
        Command::Serve { addr } => {
            deckalt::web::serve(addr)
                .await
                .with_context(|| format!("Serving on {addr}"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_messages_intact() {
        assert_eq!(truncate_message("connection refused", 80), "connection refused");
    }

    #[test]
    fn truncate_caps_long_messages_with_ellipsis() {
        let long = "x".repeat(200);
        let out = truncate_message(&long, 80);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn truncate_handles_multibyte_error_bodies() {
        // Endpoint error bodies can be localized; each 'é' is two bytes, so
        // a byte-indexed cut would land mid-character.
        let localized = "é".repeat(60);
        let out = truncate_message(&localized, 80);
        assert_eq!(out, localized);

        let long = "é".repeat(120);
        let out = truncate_message(&long, 80);
        assert_eq!(out.chars().count(), 80);
        assert!(out.ends_with('\u{2026}'));
    }
}
