use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;

use catalogsync::http::{app_router, AppState};
use catalogsync::{
    Catalog, Config, ContentfulClient, Database, DateRange, Product, ProductQuery, SyncRun,
    SyncStatus,
};

#[derive(Parser)]
#[command(name = "catalogsync", about = "Contentful product catalog mirror")]
struct Cli {
    /// Database path (default: DATABASE_PATH or ~/.catalogsync/catalogsync.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync from Contentful now
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the HTTP API and sync on a timer
    Serve {
        /// Run a sync immediately instead of waiting one interval
        #[arg(long)]
        sync_on_start: bool,
    },
    /// Browse or soft-delete stored products
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Catalog statistics
    Reports {
        #[command(subcommand)]
        report: ReportKind,
    },
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List active products, newest first
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        /// Items per page (max 5)
        #[arg(long, default_value = "5")]
        limit: u32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        brand: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        min_price: Option<f64>,
        #[arg(long)]
        max_price: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one product
    Show {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a product
    Delete { id: String },
}

#[derive(Subcommand)]
enum ReportKind {
    /// Share of soft-deleted products
    Deleted {
        #[arg(long)]
        json: bool,
    },
    /// Price coverage of active products
    NonDeleted {
        /// Created on or after (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Created on or before (YYYY-MM-DD)
        #[arg(long)]
        end_date: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Active products by category
    Categories {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::from_env()?;
    let db = match cli.db.as_deref().map(PathBuf::from).or_else(|| config.database_path.clone()) {
        Some(path) => Database::open_at(path).await?,
        None => Database::open().await?,
    };
    let catalog = Catalog::new(db);

    match cli.command {
        Commands::Sync { json } => {
            let run = scheduler(&catalog, &config)?.try_run().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                print_sync_run(&run);
            }
            if run.status == SyncStatus::Failed {
                anyhow::bail!("sync failed");
            }
        }
        Commands::Serve { sync_on_start } => {
            serve(catalog, config, sync_on_start).await?;
        }
        Commands::Products { action } => {
            handle_products(&catalog, action).await?;
        }
        Commands::Reports { report } => {
            handle_reports(&catalog, report).await?;
        }
    }

    Ok(())
}

fn scheduler(catalog: &Catalog, config: &Config) -> anyhow::Result<catalogsync::SyncScheduler> {
    let client = ContentfulClient::new(&config.contentful)?;
    Ok(catalog.scheduler(Arc::new(client), config.sync.page_size))
}

async fn serve(catalog: Catalog, config: Config, sync_on_start: bool) -> anyhow::Result<()> {
    let scheduler = Arc::new(scheduler(&catalog, &config)?);
    let (stop_tx, mut stop_rx) = watch::channel(false);

    let initial_run = sync_on_start.then(|| {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.sync_products().await })
    });

    let timer = tokio::spawn(Arc::clone(&scheduler).run_every(config.sync.interval, async move {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    }));

    let addr = config.listen_addr();
    let router = app_router(AppState::new(catalog, Arc::new(config)));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("catalogsync listening on http://{addr}");
    eprintln!("Listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutdown requested");
        })
        .await?;

    let _ = stop_tx.send(true);
    if let Some(run) = initial_run {
        if !run.is_finished() {
            log::info!("Waiting for the start-up sync to finish");
        }
        run.await?;
    }
    timer.await?;
    Ok(())
}

async fn handle_products(catalog: &Catalog, action: ProductsAction) -> anyhow::Result<()> {
    match action {
        ProductsAction::List {
            page,
            limit,
            name,
            category,
            brand,
            color,
            min_price,
            max_price,
            json,
        } => {
            let mut query = ProductQuery::new().page(page).limit(limit);
            if let Some(n) = name {
                query = query.name(&n);
            }
            if let Some(c) = category {
                query = query.category(&c);
            }
            if let Some(b) = brand {
                query = query.brand(&b);
            }
            if let Some(c) = color {
                query = query.color(&c);
            }
            if let Some(p) = min_price {
                query = query.min_price(p);
            }
            if let Some(p) = max_price {
                query = query.max_price(p);
            }

            let result = catalog.products(query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            if result.data.is_empty() {
                println!("No products found.");
            }
            for product in &result.data {
                print_product_line(product);
            }
            println!(
                "\nPage {}/{} ({} total)",
                result.page,
                result.total_pages.max(1),
                result.total
            );
        }
        ProductsAction::Show { id, json } => {
            let product = catalog.product(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&product)?);
            } else {
                print_product(&product);
            }
        }
        ProductsAction::Delete { id } => {
            catalog.delete_product(&id).await?;
            println!("Deleted product {id}");
        }
    }
    Ok(())
}

async fn handle_reports(catalog: &Catalog, report: ReportKind) -> anyhow::Result<()> {
    match report {
        ReportKind::Deleted { json } => {
            let r = catalog.deleted_report().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&r)?);
            } else {
                println!("Deleted products");
                println!("  Total:   {}", r.total_products);
                println!("  Deleted: {} ({:.2}%)", r.deleted_products, r.deleted_percentage);
            }
        }
        ReportKind::NonDeleted {
            start_date,
            end_date,
            json,
        } => {
            let range = DateRange::parse(start_date.as_deref(), end_date.as_deref())?;
            let r = catalog.non_deleted_report(range).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&r)?);
            } else {
                println!("Active products");
                if let Some(ref range) = r.date_range {
                    println!(
                        "  Created: {} .. {}",
                        range.start_date.as_deref().unwrap_or("*"),
                        range.end_date.as_deref().unwrap_or("*")
                    );
                }
                println!("  Total:         {}", r.total_non_deleted);
                println!("  With price:    {} ({:.2}%)", r.with_price, r.with_price_percentage);
                println!("  Without price: {} ({:.2}%)", r.without_price, r.without_price_percentage);
            }
        }
        ReportKind::Categories { json } => {
            let r = catalog.category_report().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&r)?);
            } else {
                println!("Products by category ({} total)", r.total_products);
                for share in &r.distribution {
                    println!("  {:<24} {:>6}  {:>6.2}%", share.category, share.count, share.percentage);
                }
            }
        }
    }
    Ok(())
}

fn print_product_line(p: &Product) {
    let price = match (p.price, p.currency.as_deref()) {
        (Some(price), Some(cur)) => format!("{price:.2} {cur}"),
        (Some(price), None) => format!("{price:.2}"),
        _ => "-".to_string(),
    };
    println!(
        "{}  {:<32}  {:<16}  {}",
        p.id,
        p.name.as_deref().unwrap_or("(unnamed)"),
        p.category.as_deref().unwrap_or("-"),
        price
    );
}

fn print_product(p: &Product) {
    let opt = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    println!("Product: {}", p.id);
    println!("  External ID: {}", p.external_id);
    println!("  Name:        {}", opt(&p.name));
    println!("  SKU:         {}", p.sku.map_or("-".to_string(), |v| v.to_string()));
    println!("  Brand:       {}", opt(&p.brand));
    println!("  Model:       {}", opt(&p.model));
    println!("  Category:    {}", opt(&p.category));
    println!("  Color:       {}", opt(&p.color));
    println!("  Price:       {}", p.price.map_or("-".to_string(), |v| format!("{v:.2}")));
    println!("  Currency:    {}", opt(&p.currency));
    println!("  Stock:       {}", p.stock.map_or("-".to_string(), |v| v.to_string()));
    println!("  Created:     {}", p.created_at);
}

fn print_sync_run(run: &SyncRun) {
    println!("Sync: {:?}", run.status);
    println!("  Started:  {}", run.started_at.to_rfc3339());
    println!("  Fetched:  {} items", run.fetched);
    println!("  Inserted: {}", run.inserted);
    println!("  Skipped:  {} (already stored)", run.skipped);
    println!("  Duration: {}ms", run.duration_ms);
    if let Some(ref err) = run.error {
        println!("  Error:    {err}");
    }
}
