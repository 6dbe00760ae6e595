use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use usda_fdc::analysis::analyze::DEFAULT_SERVING_SIZE;
use usda_fdc::analysis::nutrients::NutrientGroup;
use usda_fdc::analysis::{
    analyze_food, analyze_recipe, compare_foods, create_recipe, render_html_report,
    AnalysisOptions, DriType, Gender, NutrientAnalysis, NutrientComparison, RecipeAnalysis,
};
use usda_fdc::config::ConnectionArgs;
use usda_fdc::utils::logger;
use usda_fdc::utils::validation::Validate;
use usda_fdc::{
    CacheSettings, ClientSettings, FdcCache, FdcClient, FdcError, FileFoodStore, FoodOptions,
    FoodSource, LocalStorage, Result,
};

#[derive(Parser, Debug)]
#[command(name = "fdc-analyze")]
#[command(version, about = "Nutrient analysis on top of USDA FoodData Central")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct ProfileArgs {
    /// rda, ai, ul or ear
    #[arg(long, default_value = "rda")]
    dri_type: String,
    /// male or female
    #[arg(long, default_value = "male")]
    gender: String,
    #[arg(long, default_value_t = 30)]
    age: u32,
}

impl ProfileArgs {
    fn options(&self, serving_size: f64) -> Result<AnalysisOptions> {
        let options = AnalysisOptions::default()
            .with_serving_size(serving_size)
            .with_dri(
                self.dri_type.parse::<DriType>()?,
                self.gender.parse::<Gender>()?,
                self.age,
            );
        options.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Html,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one food against the dietary reference intakes
    Analyze {
        fdc_id: u32,
        /// Serving size in grams
        #[arg(long, default_value_t = DEFAULT_SERVING_SIZE)]
        serving_size: f64,
        #[command(flatten)]
        profile: ProfileArgs,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compare nutrients across foods
    Compare {
        #[arg(required = true, num_args = 2..)]
        fdc_ids: Vec<u32>,
        /// Comma separated nutrient ids, e.g. protein,iron
        #[arg(long, value_delimiter = ',')]
        nutrients: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_SERVING_SIZE)]
        serving_size: f64,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Analyze a recipe given as ingredient lines such as "1 cup oats"
    Recipe {
        #[arg(long, default_value = "Recipe")]
        name: String,
        #[arg(long, num_args = 1..)]
        ingredients: Vec<String>,
        /// File with one ingredient per line
        #[arg(long)]
        ingredients_file: Option<PathBuf>,
        #[arg(long, default_value_t = 1)]
        servings: u32,
        #[command(flatten)]
        profile: ProfileArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logger::init_cli_logger(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ fdc-analyze failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 建議: {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn build_source(settings: &ClientSettings) -> Result<Box<dyn FoodSource>> {
    let client = FdcClient::from_settings(settings)?;
    if !settings.cache_enabled {
        return Ok(Box::new(client));
    }

    let cache_settings = CacheSettings::from(settings);
    #[cfg(feature = "sqlite")]
    if let Some(url) = &settings.database_url {
        let store = usda_fdc::SqliteFoodStore::connect(url).await?;
        return Ok(Box::new(FdcCache::new(client, store, cache_settings)));
    }

    let store = FileFoodStore::new(LocalStorage::new(&settings.cache_dir));
    Ok(Box::new(FdcCache::new(client, store, cache_settings)))
}

async fn run(cli: Cli) -> Result<()> {
    let settings = cli.connection.settings()?;
    let source = build_source(&settings).await?;

    match cli.command {
        Command::Analyze {
            fdc_id,
            serving_size,
            profile,
            format,
            output,
        } => {
            let options = profile.options(serving_size)?;
            let food = source.get_food(fdc_id, &FoodOptions::default()).await?;
            let analysis = analyze_food(&food, &options)?;
            let rendered = match format {
                ReportFormat::Text => analysis_text(&analysis),
                ReportFormat::Json => to_json(&analysis)?,
                ReportFormat::Html => render_html_report(&analysis)?,
            };
            emit(&rendered, output.as_ref()).await
        }
        Command::Compare {
            fdc_ids,
            nutrients,
            serving_size,
            format,
        } => {
            let options = AnalysisOptions::default().with_serving_size(serving_size);
            let foods = source.get_foods(&fdc_ids, &FoodOptions::default()).await?;
            let ids = (!nutrients.is_empty()).then_some(nutrients.as_slice());
            let comparison = compare_foods(&foods, ids, None, &options)?;
            let rendered = match format {
                OutputFormat::Text => comparison_text(&comparison),
                OutputFormat::Json => to_json(&comparison)?,
            };
            emit(&rendered, None).await
        }
        Command::Recipe {
            name,
            ingredients,
            ingredients_file,
            servings,
            profile,
            format,
        } => {
            let options = profile.options(DEFAULT_SERVING_SIZE)?;
            let lines = ingredient_lines(ingredients, ingredients_file.as_ref()).await?;
            let recipe = create_recipe(&name, &lines, source.as_ref(), servings, None).await?;
            if recipe.ingredients.is_empty() {
                return Err(FdcError::validation("None of the ingredients could be resolved"));
            }
            let analysis = analyze_recipe(&recipe, &options)?;
            let rendered = match format {
                OutputFormat::Text => recipe_text(&analysis),
                OutputFormat::Json => to_json(&analysis)?,
            };
            emit(&rendered, None).await
        }
    }
}

async fn ingredient_lines(
    mut ingredients: Vec<String>,
    file: Option<&PathBuf>,
) -> Result<Vec<String>> {
    if let Some(path) = file {
        let content = tokio::fs::read_to_string(path).await?;
        ingredients.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if ingredients.is_empty() {
        return Err(FdcError::validation(
            "No ingredients given (use --ingredients or --ingredients-file)",
        ));
    }
    Ok(ingredients)
}

async fn emit(rendered: &str, output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            tracing::info!("📁 Report saved to: {}", path.display());
            println!("📁 Report saved to: {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|p| format!("{:.1}%", p))
        .unwrap_or_else(|| "-".to_string())
}

fn nutrient_table(out: &mut String, analysis: &NutrientAnalysis) {
    for group in [
        NutrientGroup::Macronutrient,
        NutrientGroup::Vitamin,
        NutrientGroup::Mineral,
    ] {
        let values = analysis.nutrients_in_group(group);
        if values.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", group.label());
        for value in values {
            let _ = writeln!(
                out,
                "  {:<24} {:>10.2} {:<5} {:>8}",
                value.name,
                value.amount,
                value.unit,
                percent(value.dri_percent)
            );
        }
    }
}

fn analysis_text(analysis: &NutrientAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🍎 {}", analysis.food);
    let _ = writeln!(
        out,
        "Serving: {:.1} g | Reference: {} ({}, {} years)",
        analysis.serving_size, analysis.dri_type, analysis.gender, analysis.age
    );
    let _ = writeln!(out, "Calories: {:.1} kcal", analysis.calories_per_serving);

    let dist = &analysis.macronutrient_distribution;
    if !dist.is_empty() {
        let share = |key: &str| dist.get(key).copied().unwrap_or(0.0);
        let _ = writeln!(
            out,
            "Energy split: protein {:.1}%, carbohydrate {:.1}%, fat {:.1}%",
            share("protein"),
            share("carbohydrate"),
            share("fat")
        );
    }

    nutrient_table(&mut out, analysis);
    out
}

fn comparison_text(comparison: &[NutrientComparison]) -> String {
    let mut out = String::new();
    for nutrient in comparison {
        let _ = writeln!(out, "{}", nutrient.display_name);
        if nutrient.entries.is_empty() {
            let _ = writeln!(out, "  (no data)");
        }
        for entry in &nutrient.entries {
            let _ = writeln!(out, "  {:<40} {:>10.2} {}", entry.food, entry.amount, entry.unit);
        }
    }
    out
}

fn recipe_text(analysis: &RecipeAnalysis) -> String {
    let recipe = &analysis.recipe;
    let mut out = String::new();
    let _ = writeln!(out, "📋 {}", recipe.name);
    let _ = writeln!(
        out,
        "Servings: {} | Total weight: {:.1} g | Per serving: {:.1} g",
        recipe.servings,
        recipe.total_weight_g(),
        analysis.per_serving.serving_size
    );
    let _ = writeln!(out, "\nIngredients");
    for ingredient in &recipe.ingredients {
        let _ = writeln!(out, "  {} → {}", ingredient, ingredient.food.description);
    }

    let _ = writeln!(
        out,
        "\nPer serving: {:.1} kcal",
        analysis.per_serving.calories_per_serving
    );
    nutrient_table(&mut out, &analysis.per_serving);
    out
}
