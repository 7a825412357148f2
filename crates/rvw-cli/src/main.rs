use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rvw_adapters::{service_from_config, ServiceConfig};
use rvw_core::{CategorySelector, ReviewId};
use rvw_engine::{
    apply_filters, available_channels, channel_distribution, listing_insight, public_listing,
    rating_trend, tenant_trend, ChannelFilter, FilterOptions, Granularity, PublicFilterOptions,
    RatingThreshold, ReviewSession, SortOrder, TimeRange, TrendOptions, TrendWindow,
};
use rvw_web::ReviewList;
use serde_json::to_string_pretty;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rvw-cli")]
#[command(about = "Guest review dashboard command-line interface")]
struct Cli {
    /// Read reviews from a JSON payload on disk instead of the review API.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manager review list.
    List(ListArgs),
    /// Published reviews only.
    Public {
        #[arg(long, default_value = "All")]
        threshold: RatingThreshold,
        #[arg(long, default_value = "time_desc")]
        sort: SortOrder,
    },
    /// Average rating per period.
    Trend(TrendArgs),
    /// Review count per period.
    Tenants(TrendArgs),
    /// Listings per rating band for each channel.
    Channels,
    /// Average and weakest category for one listing.
    Insight { listing: String },
    /// Publish or unpublish a review.
    Toggle {
        id: String,
        /// Confirm unpublishing a published review.
        #[arg(long)]
        yes: bool,
    },
    Serve,
}

#[derive(Debug, Args, Default)]
struct ListArgs {
    #[arg(long, default_value = "All")]
    channel: ChannelFilter,
    #[arg(long)]
    unpublished: bool,
    #[arg(long, default_value = "all")]
    range: TimeRange,
    #[arg(long, default_value = "All")]
    threshold: RatingThreshold,
    #[arg(long, default_value = "time_desc")]
    sort: SortOrder,
    #[arg(long, default_value = "Average")]
    category: CategorySelector,
}

#[derive(Debug, Args)]
struct TrendArgs {
    #[arg(long, default_value = "all")]
    window: TrendWindow,
    #[arg(long, default_value = "monthly")]
    group: String,
}

impl TrendArgs {
    fn options(&self) -> TrendOptions {
        TrendOptions {
            window: self.window,
            granularity: Granularity::parse_or_default(&self.group),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("rvw=info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut config = ServiceConfig::from_env();
    if let Some(path) = cli.fixture {
        config.fixture_path = Some(path);
    }

    let output = match cli.command.unwrap_or(Commands::List(ListArgs::default())) {
        Commands::Serve => return rvw_web::serve_from_config(&config).await,
        Commands::List(args) => {
            let options = FilterOptions {
                channel: args.channel,
                only_unpublished: args.unpublished,
                time_range: args.range,
                rating_threshold: args.threshold,
                sort: args.sort,
                category: args.category,
            };
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&ReviewList::from_refs(apply_filters(&reviews, &options, Utc::now())))?
        }
        Commands::Public { threshold, sort } => {
            let options = PublicFilterOptions {
                rating_threshold: threshold,
                sort,
            };
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&ReviewList::from_refs(public_listing(&reviews, &options)))?
        }
        Commands::Trend(args) => {
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&rating_trend(&reviews, &args.options(), Utc::now()))?
        }
        Commands::Tenants(args) => {
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&tenant_trend(&reviews, &args.options(), Utc::now()))?
        }
        Commands::Channels => {
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&serde_json::json!({
                "channels": available_channels(&reviews),
                "distribution": channel_distribution(&reviews),
            }))?
        }
        Commands::Insight { listing } => {
            let reviews = load_session(&config).await?.snapshot().await;
            to_string_pretty(&listing_insight(&reviews, Some(listing.as_str())))?
        }
        Commands::Toggle { id, yes } => {
            let session = load_session(&config).await?;
            let outcome = session.toggle(&ReviewId::new(id), |_| yes).await?;
            to_string_pretty(&outcome)?
        }
    };
    println!("{output}");

    Ok(())
}

async fn load_session(config: &ServiceConfig) -> Result<ReviewSession> {
    let session = ReviewSession::new(service_from_config(config)?);
    session.refresh().await?;
    Ok(session)
}
