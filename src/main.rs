use clap::Parser;
use tracing::info;

use rcalendar::app::App;
use rcalendar::cli::{Args, Command};
use rcalendar::{config, data, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and set up logging before anything else runs, so startup
    // failures are never silently dropped.
    let early_config: config::Config = figment::Figment::new()
        .merge(figment::providers::Env::raw())
        .extract()
        .expect("failed to load config for logging setup");
    logging::setup_logging(&early_config, args.tracing);

    info!(version = env!("CARGO_PKG_VERSION"), "starting rcalendar");

    let app = App::new().await?;

    match args.command {
        Some(Command::GenerateApiKey { app: app_label }) => {
            let key = data::api_keys::create(app.db_pool(), &app_label).await?;
            println!("{}", key.key);
        }
        Some(Command::ListApiKeys) => {
            for key in data::api_keys::list(app.db_pool()).await? {
                println!(
                    "{}\t{}\t{}",
                    key.app,
                    key.key,
                    if key.is_active { "active" } else { "inactive" }
                );
            }
        }
        None => {
            app.run().await?;
        }
    }

    Ok(())
}
