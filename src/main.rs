use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

use podget::logging::{Verbosity, init_logging};
use podget::{
    Config, ConfigInput, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient,
    SharedProgressReporter, TaggerRegistry, run,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Download new and rerun podcast episodes from RSS feeds
#[derive(Parser, Debug)]
#[command(name = "podget")]
#[command(about = "Download new and rerun podcast episodes from RSS feeds")]
#[command(version)]
struct Args {
    /// RSS feed URLs, processed in order
    #[arg(required = true)]
    feeds: Vec<String>,

    /// Directory that receives one subdirectory per feed
    #[arg(short, long, default_value = ".")]
    dest: PathBuf,

    /// Log every feed and episode as it is processed
    #[arg(short, long)]
    verbose: bool,

    /// Log debugging diagnostics (implies --verbose)
    #[arg(long)]
    debug: bool,

    /// Overwrite episodes downloaded more than this many days ago (0 = never)
    #[arg(short, long, default_value = "0")]
    rerun_days: i64,

    /// Name files by a regex capture instead of date and title,
    /// e.g. "item.guid /tal-(\d+)/"
    #[arg(long, value_name = "FIELD /REGEX/")]
    podtrac: Option<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Do not download artwork or tag downloaded files
    #[arg(long)]
    no_tag: bool,

    /// Extra attempts for downloads that fail with a transient error
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Network read timeout in seconds (0 = none)
    #[arg(long, default_value = "60")]
    timeout: u64,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new(multi: MultiProgress) -> Self {
        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("valid progress template");

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn get_or_create_bar(&self, job_index: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap();

        if let Some(bar) = bars.get(&job_index) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .expect("valid progress template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(job_index, bar.clone());
        bar
    }

    fn finish_bar(&self, job_index: usize) {
        let mut bars = self.bars.lock().unwrap();
        if let Some(bar) = bars.remove(&job_index) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedParsed {
                feed_title,
                directory,
                total_episodes,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} episodes → {}/",
                    feed_title.bold().green(),
                    total_episodes.to_string().cyan(),
                    directory.dimmed()
                ));
            }

            // The spinner keeps showing the feed; per-episode detail goes to the log
            ProgressEvent::EpisodeQueued { .. } | ProgressEvent::EpisodeSkipped { .. } => {}

            ProgressEvent::DownloadStarting {
                job_index,
                episode_title,
                content_length,
            } => {
                let bar = self.get_or_create_bar(job_index);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}] {}",
                    (job_index + 1).to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                job_index,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(job_index);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::DownloadCompleted {
                job_index,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(job_index);
                bar.set_position(bytes_downloaded);
                bar.set_message(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 40).green()
                ));
                self.finish_bar(job_index);
            }

            ProgressEvent::DownloadFailed {
                job_index,
                episode_title,
                error,
            } => {
                let bar = self.get_or_create_bar(job_index);
                bar.abandon_with_message(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(job_index);
            }

            ProgressEvent::RunCompleted {
                downloaded_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} skipped, {} failed",
                    "Run complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let cut: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let multi = if args.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    init_logging(Verbosity::from_flags(args.verbose, args.debug), multi.clone());

    let config = Config::from_input(ConfigInput {
        dest_dir: args.dest.clone(),
        rerun_days: args.rerun_days,
        extraction: args.podtrac.clone(),
        retries: args.retries,
        timeout_secs: args.timeout,
        tagging: !args.no_tag,
    })
    .context("Invalid --podtrac instruction")?;

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podget".bold().magenta(),
            "- Podcast Downloader".dimmed()
        );
    }

    let client = ReqwestClient::new(&config.http).context("Failed to build HTTP client")?;

    let taggers = if config.worker.tagging {
        let registry = TaggerRegistry::discover();
        if registry.is_empty() {
            tracing::warn!("no tagging tools found in PATH, downloads will not be tagged");
        }
        registry
    } else {
        TaggerRegistry::new()
    };

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new(multi))
    };

    let summary = run(
        Arc::new(config),
        Arc::new(client),
        Arc::new(taggers),
        args.feeds,
        reporter,
    )
    .await
    .context("Run aborted")?;

    if !args.quiet && !summary.failed_jobs.is_empty() {
        println!("\n{}", "Failed episodes:".red().bold());
        for (title, error) in &summary.failed_jobs {
            println!("  {}{} - {}", CROSS, title.yellow(), error.dimmed());
        }
    }

    if !args.quiet && summary.feeds_failed > 0 {
        println!(
            "\n{}{} of {} feeds could not be processed",
            CROSS,
            summary.feeds_failed.to_string().red().bold(),
            summary.feeds_ok + summary.feeds_failed
        );
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            args.dest.display().to_string().cyan()
        );
    }

    if summary.all_downloads_failed() {
        std::process::exit(1);
    }

    Ok(())
}
