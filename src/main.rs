pub mod types;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod scale;
pub mod state;
pub mod map;
pub mod overlay;
pub mod panels;
pub mod tiles;
pub mod app;
pub mod gui;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive density map
    View {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// GeoJSON dataset, overrides `input.geojson`
        #[arg(short, long, value_name = "FILE")]
        data: Option<PathBuf>,
    },
    /// Print the density legend
    Legend,
    /// Show what the info box says with the pointer at a position
    Query {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_name = "FILE")]
        data: Option<PathBuf>,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Print the hovered feature as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load(config: &Path, dataset: Option<&Path>) -> anyhow::Result<(config::AppConfig, Vec<types::Feature>)> {
    let mut app_config = config::AppConfig::load_or_default(config)?;
    if let Some(path) = dataset {
        app_config.input.geojson = path.to_path_buf();
    }
    logging::init_logging(&app_config.logging.filter);
    let features = data::load_features(&app_config.input.geojson)?;
    Ok((app_config, features))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::View { config, data } => {
            let (app_config, features) = load(config, data.as_deref())?;
            tracing::info!("Opening map with {} features", features.len());
            gui::run_viewer(app_config, features)?;
        }
        Commands::Legend => {
            for entry in scale::ColorScale::DENSITY.legend() {
                println!("{}  {}", entry.color, entry.label);
            }
        }
        Commands::Query { config, data, lat, lon, json } => {
            let (app_config, features) = load(config, data.as_deref())?;
            let mut view = app::ChoroplethView::build(features, &app_config);
            view.overlay.pointer_moved(
                Some(types::LatLng::new(*lat, *lon)),
                &mut view.map,
            );

            if *json {
                let hovered = match view.info.content() {
                    panels::InfoContent::Feature(props) => Some(props),
                    panels::InfoContent::Prompt => None,
                };
                println!("{}", serde_json::to_string_pretty(&hovered)?);
            } else {
                println!("{}", view.info.text());
            }
        }
    }

    Ok(())
}
