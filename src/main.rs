use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Write;
use usda_fdc::config::ConnectionArgs;
use usda_fdc::domain::query::DEFAULT_PAGE_SIZE;
use usda_fdc::utils::logger;
use usda_fdc::{
    CacheSettings, CacheTaskReport, FdcCache, FdcClient, FdcError, FileFoodStore, Food,
    FoodOptions, FoodSource, FoodStore, ListQuery, LocalStorage, Nutrient, Result, SearchQuery,
    SearchResult, SortOrder,
};

#[derive(Parser, Debug)]
#[command(name = "fdc")]
#[command(version, about = "Search and fetch foods from USDA FoodData Central")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Bypass the local cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DetailFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search foods by keyword
    Search(SearchArgs),
    /// Show the details of one food
    Food {
        fdc_id: u32,
        #[arg(long, value_enum, default_value_t = DetailFormat::Text)]
        format: DetailFormat,
    },
    /// List the nutrients of one food
    Nutrients {
        fdc_id: u32,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List foods page by page
    List(ListArgs),
    /// Maintain the local food cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
struct SearchArgs {
    query: String,
    #[arg(long = "data-type")]
    data_types: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    #[arg(long, default_value_t = 1)]
    page_number: u32,
    #[arg(long)]
    sort_by: Option<String>,
    /// asc or desc
    #[arg(long)]
    sort_order: Option<String>,
    #[arg(long)]
    brand_owner: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long = "data-type")]
    data_types: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    #[arg(long, default_value_t = 1)]
    page_number: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Fetch foods into the cache
    Import(ImportArgs),
    /// Refresh stale entries or warm the cache from a food listing
    Refresh(RefreshArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["fdc_ids", "search", "data_types"])))]
struct ImportArgs {
    #[arg(long = "fdc-id", num_args = 1..)]
    fdc_ids: Vec<u32>,
    /// Import the foods matching a search
    #[arg(long)]
    search: Option<String>,
    /// Import foods listed for these data types
    #[arg(long = "data-type")]
    data_types: Vec<String>,
    #[arg(long, default_value_t = 100)]
    limit: usize,
    /// Re-fetch foods that are already cached
    #[arg(long)]
    force: bool,
    #[arg(long, default_value_t = 20)]
    batch_size: usize,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("mode").required(true).args(["stale", "warm"])))]
struct RefreshArgs {
    /// Refresh foods older than --days
    #[arg(long)]
    stale: bool,
    #[arg(long, default_value_t = 30)]
    days: i64,
    /// Warm the cache from the food list
    #[arg(long)]
    warm: bool,
    #[arg(long = "data-type")]
    data_types: Vec<String>,
    #[arg(long, default_value_t = 1000)]
    limit: usize,
    #[arg(long, default_value_t = 20)]
    batch_size: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI args: {:?}", cli.command);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ fdc failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.connection.settings()?;
    let client = FdcClient::from_settings(&settings)?;

    if cli.no_cache || !settings.cache_enabled {
        if matches!(cli.command, Command::Cache(_)) {
            return Err(FdcError::validation(
                "Cache commands need the cache enabled (drop --no-cache or set FDC_CACHE_ENABLED=true)",
            ));
        }
        return execute(&client, cli.command).await;
    }

    let cache_settings = CacheSettings::from(&settings);

    #[cfg(feature = "sqlite")]
    if let Some(url) = &settings.database_url {
        tracing::debug!("💾 using sqlite cache");
        let store = usda_fdc::SqliteFoodStore::connect(url).await?;
        return run_cached(FdcCache::new(client, store, cache_settings), cli.command).await;
    }

    tracing::debug!("💾 using file cache at {}", settings.cache_dir);
    let store = FileFoodStore::new(LocalStorage::new(&settings.cache_dir));
    run_cached(FdcCache::new(client, store, cache_settings), cli.command).await
}

async fn run_cached<St: FoodStore>(cache: FdcCache<FdcClient, St>, command: Command) -> Result<()> {
    match command {
        Command::Cache(cmd) => run_cache_command(&cache, cmd).await,
        other => execute(&cache, other).await,
    }
}

async fn execute<S: FoodSource + ?Sized>(source: &S, command: Command) -> Result<()> {
    match command {
        Command::Search(args) => {
            let format = args.format;
            let result = source.search(&search_query(args)?).await?;
            print_search(&result, format)
        }
        Command::Food { fdc_id, format } => {
            let food = source.get_food(fdc_id, &FoodOptions::default()).await?;
            match format {
                DetailFormat::Text => print_food(&food),
                DetailFormat::Json => print_json(&food),
            }
        }
        Command::Nutrients { fdc_id, format } => {
            let nutrients = source.get_nutrients(fdc_id).await?;
            print_nutrients(&nutrients, format)
        }
        Command::List(args) => {
            let query = ListQuery::default()
                .data_types(args.data_types)
                .page_size(args.page_size)
                .page_number(args.page_number);
            let foods = source.list_foods(&query).await?;
            print_list(&foods, args.format)
        }
        Command::Cache(_) => Err(FdcError::validation("Cache commands need the cache enabled")),
    }
}

fn search_query(args: SearchArgs) -> Result<SearchQuery> {
    let mut query = SearchQuery::new(args.query)
        .data_types(args.data_types)
        .page_size(args.page_size)
        .page_number(args.page_number);
    if let Some(sort_by) = args.sort_by {
        let order = match args.sort_order {
            Some(raw) => raw.parse::<SortOrder>()?,
            None => SortOrder::Asc,
        };
        query = query.sort(sort_by, order);
    }
    if let Some(brand_owner) = args.brand_owner {
        query = query.brand_owner(brand_owner);
    }
    Ok(query)
}

async fn run_cache_command<St: FoodStore>(
    cache: &FdcCache<FdcClient, St>,
    command: CacheCommand,
) -> Result<()> {
    let report = match command {
        CacheCommand::Import(args) => {
            if !args.fdc_ids.is_empty() {
                cache
                    .import_foods(&args.fdc_ids, args.force, args.batch_size)
                    .await?
            } else if let Some(search) = args.search {
                let query = SearchQuery::new(search);
                cache
                    .import_search(&query, args.limit, args.force, args.batch_size)
                    .await?
            } else {
                cache
                    .warm(&args.data_types, args.limit, args.batch_size)
                    .await?
            }
        }
        CacheCommand::Refresh(args) if args.stale => {
            cache
                .refresh_stale(stale_age(args.days)?, args.limit, args.batch_size)
                .await?
        }
        CacheCommand::Refresh(args) => {
            cache
                .warm(&args.data_types, args.limit, args.batch_size)
                .await?
        }
    };

    print_report(&report, cache.store().count().await?)
}

/// `--days` 轉成過期門檻
fn stale_age(days: i64) -> Result<chrono::Duration> {
    if days < 0 {
        return Err(FdcError::validation("--days cannot be negative"));
    }
    chrono::Duration::try_days(days)
        .ok_or_else(|| FdcError::validation(format!("--days {} is out of range", days)))
}

fn print_report(report: &CacheTaskReport, cached: usize) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "✅ requested {}, stored {}, skipped {}, failed batches {}",
        report.requested, report.stored, report.skipped, report.failed_batches
    )?;
    writeln!(out, "📁 {} foods in cache", cached)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct SearchRow<'a> {
    fdc_id: u32,
    description: &'a str,
    data_type: &'a str,
    brand_owner: &'a str,
    food_category: &'a str,
    score: Option<f64>,
}

#[derive(Serialize)]
struct FoodRow<'a> {
    fdc_id: u32,
    description: &'a str,
    data_type: &'a str,
    publication_date: String,
}

#[derive(Serialize)]
struct NutrientRow<'a> {
    id: u32,
    name: &'a str,
    amount: f64,
    unit: &'a str,
    nutrient_nbr: &'a str,
}

fn print_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_search(result: &SearchResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Csv => print_csv(result.foods.iter().map(|f| SearchRow {
            fdc_id: f.fdc_id,
            description: &f.description,
            data_type: &f.data_type,
            brand_owner: f.brand_owner.as_deref().unwrap_or(""),
            food_category: f.food_category.as_deref().unwrap_or(""),
            score: f.score,
        })),
        OutputFormat::Text => {
            let mut out = std::io::stdout().lock();
            writeln!(
                out,
                "🔎 {} foods found (page {}/{})",
                result.total_hits, result.current_page, result.total_pages
            )?;
            for food in &result.foods {
                write!(out, "{:>10}  {} [{}]", food.fdc_id, food.description, food.data_type)?;
                if let Some(brand) = &food.brand_owner {
                    write!(out, " ({})", brand)?;
                }
                writeln!(out)?;
            }
            Ok(())
        }
    }
}

fn print_food(food: &Food) -> Result<()> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", food.description)?;
    writeln!(out, "  FDC ID:     {}", food.fdc_id)?;
    writeln!(out, "  Data type:  {}", food.data_type)?;
    if let Some(date) = food.publication_date {
        writeln!(out, "  Published:  {}", date)?;
    }
    if let Some(category) = &food.food_category {
        writeln!(out, "  Category:   {}", category)?;
    }
    if let Some(brand) = food.brand_owner.as_ref().or(food.brand_name.as_ref()) {
        writeln!(out, "  Brand:      {}", brand)?;
    }
    if let (Some(size), Some(unit)) = (food.serving_size, &food.serving_size_unit) {
        writeln!(out, "  Serving:    {} {}", size, unit)?;
    }
    if let Some(ingredients) = &food.ingredients {
        writeln!(out, "  Ingredients: {}", ingredients)?;
    }

    writeln!(out, "\nNutrients per 100 g ({}):", food.nutrients.len())?;
    for nutrient in &food.nutrients {
        writeln!(out, "  {}", nutrient)?;
    }
    if !food.food_portions.is_empty() {
        writeln!(out, "\nPortions:")?;
        for portion in &food.food_portions {
            writeln!(out, "  {}", portion)?;
        }
    }
    Ok(())
}

fn print_nutrients(nutrients: &[Nutrient], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&nutrients),
        OutputFormat::Csv => print_csv(nutrients.iter().map(|n| NutrientRow {
            id: n.id,
            name: &n.name,
            amount: n.amount,
            unit: &n.unit_name,
            nutrient_nbr: n.nutrient_nbr.as_deref().unwrap_or(""),
        })),
        OutputFormat::Text => {
            let mut out = std::io::stdout().lock();
            for n in nutrients {
                writeln!(out, "{:>6}  {:<45} {:>10.3} {}", n.id, n.name, n.amount, n.unit_name)?;
            }
            Ok(())
        }
    }
}

fn print_list(foods: &[Food], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&foods),
        OutputFormat::Csv => print_csv(foods.iter().map(|f| FoodRow {
            fdc_id: f.fdc_id,
            description: &f.description,
            data_type: &f.data_type,
            publication_date: f
                .publication_date
                .map(|d| d.to_string())
                .unwrap_or_default(),
        })),
        OutputFormat::Text => {
            let mut out = std::io::stdout().lock();
            for food in foods {
                writeln!(out, "{:>10}  {} [{}]", food.fdc_id, food.description, food.data_type)?;
            }
            Ok(())
        }
    }
}
