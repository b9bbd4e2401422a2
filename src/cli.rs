//! CLI interface for creator-persona

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::entitlements::StaticEntitlements;
use crate::events::BehaviorEvent;
use crate::generation::TemplateGenerator;
use crate::insights::WeekPeriod;
use crate::patterns::PromptParams;
use crate::results::ContentResult;
use crate::service::Personalizer;
use crate::store::SqliteStore;
use crate::suggestions::{DailyRequest, SeededRandom};
use crate::types::{ActionType, CtaStyle, Format, Goal, Opening, Pacing, Platform, Tone};

#[derive(Parser)]
#[command(name = "creator-persona")]
#[command(about = "Creator persona learning, pattern rankings, daily suggestions and weekly insights", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "CREATOR_PERSONA_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path, overrides the config file
    #[arg(long, global = true, env = "CREATOR_PERSONA_DB")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Prompt parameters shared by events and results
#[derive(clap::Args, Debug, Clone)]
struct ParamArgs {
    /// Platform the content was generated for
    #[arg(long)]
    platform: Option<Platform>,
    #[arg(long)]
    tone: Option<Tone>,
    #[arg(long)]
    format: Option<Format>,
    #[arg(long)]
    opening: Option<Opening>,
    #[arg(long)]
    goal: Option<Goal>,
    /// Category group slug (requires --category)
    #[arg(long, requires = "category")]
    category_group: Option<String>,
    /// Category slug (requires --category-group)
    #[arg(long, requires = "category_group")]
    category: Option<String>,
}

impl ParamArgs {
    fn to_params(&self, platform: Platform) -> Result<PromptParams> {
        let mut params = PromptParams::new(platform);
        if let (Some(group), Some(slug)) = (&self.category_group, &self.category) {
            params = params.with_category(group, slug)?;
        }
        if let Some(tone) = self.tone {
            params = params.with_tone(tone);
        }
        if let Some(format) = self.format {
            params = params.with_format(format);
        }
        if let Some(opening) = self.opening {
            params = params.with_opening(opening);
        }
        if let Some(goal) = self.goal {
            params = params.with_goal(goal);
        }
        Ok(params)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record a behavioral event
    Event {
        /// Creator ID
        #[arg(short, long)]
        user: String,
        /// generation, save, export, ab_win or onboarding
        #[arg(short, long)]
        action: ActionType,
        #[command(flatten)]
        params: ParamArgs,
        #[arg(long)]
        cta_style: Option<CtaStyle>,
        #[arg(long)]
        pacing: Option<Pacing>,
        /// Hook length in words
        #[arg(long)]
        hook_length: Option<u32>,
        /// Performance score, for A/B wins
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        generation_id: Option<String>,
        /// Event ID; replays with the same ID are ignored
        #[arg(long)]
        id: Option<String>,
    },
    /// Record a measured content result
    Result {
        #[arg(short, long)]
        user: String,
        /// Result ID; re-recording the same ID updates in place
        #[arg(long)]
        id: String,
        #[command(flatten)]
        params: ParamArgs,
        #[arg(long, default_value = "0")]
        views: u64,
        #[arg(long, default_value = "0")]
        likes: u64,
        #[arg(long, default_value = "0")]
        comments: u64,
        #[arg(long, default_value = "0")]
        shares: u64,
        #[arg(long, default_value = "0")]
        saves: u64,
        /// Engagement rate in percent, derived from interactions when omitted
        #[arg(long)]
        engagement_rate: Option<f64>,
        /// Opening text of the posted content
        #[arg(long)]
        preview: Option<String>,
        #[arg(long)]
        generation_id: Option<String>,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        posted_at: Option<DateTime<Utc>>,
    },
    /// Show the best measured patterns
    Top {
        #[arg(short, long)]
        user: String,
        /// Restrict to platforms (repeatable)
        #[arg(short, long)]
        platform: Vec<Platform>,
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },
    /// Show the persona profile
    Profile {
        #[arg(short, long)]
        user: String,
        /// Rebuild from the full event log first
        #[arg(long)]
        rebuild: bool,
    },
    /// Show the generation overlay
    Overlay {
        #[arg(short, long)]
        user: String,
    },
    /// Generate today's suggestions
    Daily {
        #[arg(short, long)]
        user: String,
        /// Platforms to generate for (repeatable)
        #[arg(short, long, required = true)]
        platform: Vec<Platform>,
        /// Total ideas across all platforms
        #[arg(short, long, default_value = "5")]
        count: usize,
        /// YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Share of slots used for exploration
        #[arg(long)]
        explore_ratio: Option<f64>,
        /// Replace rows that already exist for the date
        #[arg(long)]
        regenerate: bool,
        /// Seed for exploration sampling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Mark a day's suggestions as used
    MarkUsed {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        platform: Platform,
        /// YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Generation that used the suggestion
        #[arg(long)]
        generation_id: Option<String>,
    },
    /// Build the weekly insight
    Weekly {
        #[arg(short, long)]
        user: String,
        /// ISO week such as 2024-W07 (defaults to last completed week)
        #[arg(short, long)]
        week: Option<WeekPeriod>,
    },
    /// Show configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
        /// Print the config file path
        #[arg(long)]
        path: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn open_service(config: &Config, database: Option<PathBuf>) -> Result<Personalizer> {
    let path = match database {
        Some(path) => path,
        None => config.storage.resolve_database_path()?,
    };
    let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))?;

    Ok(Personalizer::new(
        Arc::new(store),
        Arc::new(TemplateGenerator::new()),
        Arc::new(StaticEntitlements::from_config(&config.entitlements)),
        config,
    ))
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Event {
            user,
            action,
            params,
            cta_style,
            pacing,
            hook_length,
            score,
            generation_id,
            id,
        } => {
            let service = open_service(&config, cli.database).await?;
            let mut event = BehaviorEvent::new(&user, action);
            if let Some(id) = id {
                event = event.with_id(&id);
            }
            if let Some(platform) = params.platform {
                event = event.with_params(params.to_params(platform)?);
            }
            if let Some(tone) = params.tone {
                event = event.with_tone(tone);
            }
            if let Some(format) = params.format {
                event = event.with_format(format);
            }
            if let Some(opening) = params.opening {
                event = event.with_opening(opening);
            }
            if let Some(cta) = cta_style {
                event = event.with_cta_style(cta);
            }
            if let Some(pacing) = pacing {
                event = event.with_pacing(pacing);
            }
            if let Some(words) = hook_length {
                event = event.with_hook_length(words);
            }
            if let Some(score) = score {
                event = event.with_score(score);
            }
            if let Some(generation_id) = generation_id {
                event = event.with_generation_id(&generation_id);
            }

            match service.record_event(&event).await? {
                Some(profile) => print_json(&profile)?,
                None => println!("Event {} was already recorded.", event.id),
            }
        }
        Commands::Result {
            user,
            id,
            params,
            views,
            likes,
            comments,
            shares,
            saves,
            engagement_rate,
            preview,
            generation_id,
            posted_at,
        } => {
            let platform = params.platform.context("--platform is required for results")?;
            let service = open_service(&config, cli.database).await?;
            let mut result = ContentResult::new(&id, &user, params.to_params(platform)?, views)
                .with_interactions(likes, comments, shares, saves)
                .posted_at(posted_at.unwrap_or_else(Utc::now));
            if let Some(rate) = engagement_rate {
                result = result.with_engagement_rate(rate);
            }
            if let Some(preview) = preview {
                result = result.with_preview(&preview);
            }
            if let Some(generation_id) = generation_id {
                result = result.with_generation_id(&generation_id);
            }

            let recorded = service.record_result(&result).await?;
            if !recorded.newly_recorded {
                eprintln!("Result {} already existed; updated in place.", id);
            }
            print_json(&recorded.stats)?;
        }
        Commands::Top { user, platform, limit } => {
            let service = open_service(&config, cli.database).await?;
            print_json(&service.top_patterns(&user, &platform, limit).await?)?;
        }
        Commands::Profile { user, rebuild } => {
            let service = open_service(&config, cli.database).await?;
            if rebuild {
                print_json(&service.rebuild_profile(&user).await?)?;
            } else {
                match service.profile(&user).await? {
                    Some(profile) => print_json(&profile)?,
                    None => println!("No persona recorded for {} yet.", user),
                }
            }
        }
        Commands::Overlay { user } => {
            let service = open_service(&config, cli.database).await?;
            print_json(&service.overlay(&user).await)?;
        }
        Commands::Daily {
            user,
            platform,
            count,
            date,
            explore_ratio,
            regenerate,
            seed,
        } => {
            let mut service = open_service(&config, cli.database).await?;
            if let Some(seed) = seed {
                service = service.with_random(Box::new(SeededRandom::seeded(seed)));
            }
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let request = DailyRequest::new(&user, date, platform, count)
                .with_explore_ratio(explore_ratio.unwrap_or(config.suggestions.explore_ratio))
                .regenerate(regenerate);

            let batch = service.generate_daily(&request).await?;
            if batch.skipped > 0 {
                eprintln!("{} of {} ideas could not be generated.", batch.skipped, batch.requested);
            }
            if batch.unfilled > 0 {
                eprintln!("{} slots had no untried combination left to explore.", batch.unfilled);
            }
            print_json(&batch)?;
        }
        Commands::MarkUsed {
            user,
            platform,
            date,
            generation_id,
        } => {
            let service = open_service(&config, cli.database).await?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let row = service
                .mark_used(&user, date, platform, generation_id.as_deref())
                .await?;
            print_json(&row)?;
        }
        Commands::Weekly { user, week } => {
            let service = open_service(&config, cli.database).await?;
            let period = week.unwrap_or_else(|| WeekPeriod::last_completed(Utc::now().date_naive()));
            match service.generate_weekly(&user, period).await? {
                Some(insight) => print_json(&insight)?,
                None => println!(
                    "Not enough results in {} for an insight (need {}).",
                    period, config.insights.min_results
                ),
            }
        }
        Commands::Config { show, path } => {
            if path {
                println!("{}", config::config_path()?.display());
            } else if show {
                let contents = toml::to_string_pretty(&config).context("Failed to serialize config")?;
                println!("{}", contents);
            } else {
                println!("Configuration options:");
                println!("  --show    Print the effective configuration");
                println!("  --path    Print the config file path");
                println!();
                println!("Defaults:");
                println!("{}", config::default_config_toml());
            }
        }
    }

    Ok(())
}
