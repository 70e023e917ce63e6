use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nichepress_client::{
    GeminiClient, HtmdCleaner, ScrapingAntClient, WebhookNotifier, WordPressPublisher,
};
use nichepress_core::politeness::Politeness;
use nichepress_core::prompt::ArticleRequest;
use nichepress_core::{
    ContentWriter, CredentialPool, KeywordReport, KeywordWorklist, Pipeline, PipelineConfig,
    ScrapeService, TracingPipelineReporter,
};
use nichepress_db::{Database, DatabaseConfig, ProductRepository};

#[derive(Parser)]
#[command(name = "nichepress", version, about = "Affiliate review pipeline")]
struct Cli {
    #[command(flatten)]
    keys: KeyArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Comma-separated API key pools.
#[derive(Args)]
struct KeyArgs {
    /// ScrapingAnt API keys
    #[arg(
        long,
        env = "SCRAPINGANT_API_KEYS",
        hide_env_values = true,
        default_value = "",
        global = true
    )]
    scrapingant_keys: String,

    /// Gemini API keys
    #[arg(
        long,
        env = "GEMINI_API_KEYS",
        hide_env_values = true,
        default_value = "",
        global = true
    )]
    gemini_keys: String,

    /// Gemini REST base URL
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com/v1beta",
        global = true
    )]
    gemini_base_url: String,

    /// Fail instead of rotating keys on unexpected proxy statuses
    #[arg(long, default_value_t = false, global = true)]
    strict_proxy: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, review and publish products for niche keywords
    Run(RunArgs),

    /// Scrape one product page and print it as JSON
    Scrape {
        #[arg(short, long)]
        url: String,
    },

    /// Scrape a product and print a generated article without publishing
    Generate {
        #[arg(short, long)]
        url: String,

        #[arg(short, long, default_value = "English")]
        language: String,
    },

    /// Suggest target keywords from a competitor page's headings
    Spy {
        #[arg(short, long)]
        url: String,
    },

    /// Check where a domain ranks on Google for a keyword
    Rank {
        #[arg(short, long)]
        keyword: String,

        #[arg(short, long)]
        domain: String,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Process this keyword only, bypassing the worklist
    #[arg(short, long)]
    keyword: Option<String>,

    /// Directory holding keywords.txt and processed_keywords.txt
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Keep going until every keyword is processed
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Products to take from each keyword's search page
    #[arg(long, default_value_t = 3)]
    products: usize,

    /// Seconds to wait between products and between keywords
    #[arg(long, default_value_t = 5)]
    delay_secs: u64,

    /// Extra random delay in milliseconds
    #[arg(long, default_value_t = 0)]
    jitter_ms: u64,

    #[arg(short, long, default_value = "English")]
    language: String,

    /// Competitor article to outdo
    #[arg(long)]
    competitor_url: Option<String>,

    /// WordPress category id
    #[arg(long, default_value_t = 1)]
    category_id: u64,

    #[arg(long, env = "WP_URL")]
    wp_url: String,

    #[arg(long, env = "WP_USERNAME")]
    wp_username: String,

    #[arg(long, env = "WP_APP_PASSWORD", hide_env_values = true)]
    wp_app_password: String,

    /// n8n webhook for social cross-posting
    #[arg(long, env = "N8N_WEBHOOK_URL")]
    n8n_webhook_url: Option<String>,

    #[arg(long, default_value_t = false)]
    no_video: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nichepress=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(&cli.keys, args).await?,
        Commands::Scrape { url } => cmd_scrape(&cli.keys, &url).await?,
        Commands::Generate { url, language } => cmd_generate(&cli.keys, &url, &language).await?,
        Commands::Spy { url } => cmd_spy(&cli.keys, &url).await?,
        Commands::Rank { keyword, domain } => cmd_rank(&cli.keys, &keyword, &domain).await?,
    }

    Ok(())
}

fn scrape_service(keys: &KeyArgs) -> Result<ScrapeService<ScrapingAntClient>> {
    let proxy = ScrapingAntClient::new()
        .context("Failed to create ScrapingAnt client")?
        .abort_on_unexpected_status(keys.strict_proxy);
    let pool = CredentialPool::from_csv("scrapingant", &keys.scrapingant_keys);
    anyhow::ensure!(!pool.is_empty(), "No ScrapingAnt keys: set SCRAPINGANT_API_KEYS");
    tracing::info!(keys = pool.len(), "Loaded ScrapingAnt keys");
    Ok(ScrapeService::new(proxy, pool))
}

fn content_writer(keys: &KeyArgs) -> Result<ContentWriter<GeminiClient>> {
    let llm = GeminiClient::with_base_url(&keys.gemini_base_url)
        .context("Failed to create Gemini client")?;
    let pool = CredentialPool::from_csv("gemini", &keys.gemini_keys);
    anyhow::ensure!(!pool.is_empty(), "No Gemini keys: set GEMINI_API_KEYS");
    tracing::info!(keys = pool.len(), "Loaded Gemini keys");
    Ok(ContentWriter::new(llm, pool))
}

async fn connect_store() -> Result<ProductRepository> {
    let config = DatabaseConfig::from_env()?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await?;
    Ok(db.product_repo())
}

/// Cancel the token on Ctrl-C so the run stops after the current product.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, finishing current item");
            child.cancel();
        }
    });
    token
}

async fn cmd_run(keys: &KeyArgs, args: RunArgs) -> Result<()> {
    let delay = Politeness::new(Duration::from_secs(args.delay_secs))
        .with_jitter(Duration::from_millis(args.jitter_ms));
    let notify = args.n8n_webhook_url.is_some();
    let config = PipelineConfig::default()
        .with_products_per_keyword(args.products)
        .with_product_delay(delay.clone())
        .with_keyword_delay(delay)
        .with_language(args.language)
        .with_category_id(Some(args.category_id))
        .with_notify(notify)
        .with_video(!args.no_video)
        .with_competitor_url(args.competitor_url);

    let publisher =
        WordPressPublisher::new(&args.wp_url, &args.wp_username, &args.wp_app_password)?;
    let notifier = args
        .n8n_webhook_url
        .as_deref()
        .map(WebhookNotifier::new)
        .transpose()?;
    let scraper = scrape_service(keys)?;
    let writer = content_writer(keys)?;
    let store = connect_store().await?;

    let mut pipeline = Pipeline::new(
        scraper,
        writer,
        HtmdCleaner::new(),
        publisher,
        notifier,
        store,
        config,
    );

    let cancel = cancel_on_ctrl_c();
    let reporter = TracingPipelineReporter;

    let reports = if let Some(keyword) = &args.keyword {
        vec![pipeline.run_keyword(keyword, &cancel, &reporter).await?]
    } else {
        let worklist = KeywordWorklist::in_dir(&args.dir);
        if args.all {
            pipeline.run_all(&worklist, &cancel, &reporter).await?
        } else {
            pipeline
                .run_next(&worklist, &cancel, &reporter)
                .await?
                .into_iter()
                .collect()
        }
    };

    print_summary(&reports);
    Ok(())
}

fn print_summary(reports: &[KeywordReport]) {
    if reports.is_empty() {
        println!("No keywords to process.");
        return;
    }
    for r in reports {
        match &r.discovery_error {
            Some(e) => println!("{}: discovery failed ({e})", r.keyword),
            None => println!(
                "{}: {} found, {} published, {} skipped, {} failed{}",
                r.keyword,
                r.discovered,
                r.published,
                r.skipped,
                r.failed,
                if r.cancelled { " (cancelled)" } else { "" }
            ),
        }
    }
}

async fn cmd_scrape(keys: &KeyArgs, url: &str) -> Result<()> {
    let mut scraper = scrape_service(keys)?;
    let product = scraper.product(url).await.context("Scrape failed")?;
    println!("{}", serde_json::to_string_pretty(&product)?);
    Ok(())
}

async fn cmd_generate(keys: &KeyArgs, url: &str, language: &str) -> Result<()> {
    let mut scraper = scrape_service(keys)?;
    let mut writer = content_writer(keys)?;

    let product = scraper.product(url).await.context("Scrape failed")?;
    let request = ArticleRequest::new(&product).with_language(language);
    let article = writer
        .write_article(&request)
        .await
        .context("Generation failed")?;

    println!("{}", article.html);
    if let Some(social) = &article.social {
        eprintln!("{}", serde_json::to_string_pretty(social)?);
    }
    Ok(())
}

async fn cmd_spy(keys: &KeyArgs, url: &str) -> Result<()> {
    let mut scraper = scrape_service(keys)?;
    let mut writer = content_writer(keys)?;

    let headings = scraper
        .headings(url)
        .await
        .context("Could not read competitor page")?;
    tracing::info!(count = headings.len(), "Headings found");

    let keywords = writer
        .suggest_keywords(&headings)
        .await
        .context("Keyword analysis failed")?;
    for keyword in keywords {
        println!("{keyword}");
    }
    Ok(())
}

async fn cmd_rank(keys: &KeyArgs, keyword: &str, domain: &str) -> Result<()> {
    let mut scraper = scrape_service(keys)?;
    let rank = scraper
        .check_rank(keyword, domain)
        .await
        .context("Rank check failed")?;

    match (rank.rank, rank.url) {
        (Some(position), Some(url)) => println!("#{position}: {url}"),
        _ => println!("Not in the top {} results", rank.scanned),
    }
    Ok(())
}
