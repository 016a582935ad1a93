#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the region map.
//!
//! ```text
//! region_map_cli regions
//! region_map_cli states [--output states.geojson]
//! region_map_cli counties --region West [--output west.geojson]
//! region_map_cli all-counties [--output counties.geojson]
//! region_map_cli locate --lon -104.99 --lat 39.74
//! region_map_cli classify --region West --method "Natural Breaks (Jenks)" --classes 5 --scheme Blues
//! ```
//!
//! Every command accepts `--config <file.toml>`; environment overrides are
//! applied on top (see `region_map_session::config`).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use region_map_acquisition::Cancellation;
use region_map_classify::{
    ChoroplethLayer, ClassificationMethod, ColorScheme, DEFAULT_CLASSES, NO_DATA_COLOR,
    NO_DATA_LABEL,
};
use region_map_cli_utils::{IndicatifProgress, MultiProgress};
use region_map_geometry::export::{to_geojson_with, write_geojson};
use region_map_geometry::label::label_point;
use region_map_geometry_models::{Feature, FeatureCollection};
use region_map_session::{LoadTask, MapSession};
use serde_json::{Value, json};

#[derive(Parser)]
#[command(
    name = "region_map_cli",
    about = "Load, locate, and classify US state and county boundaries by region"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List regions with their colors and states
    Regions,
    /// Load every state boundary
    States {
        /// GeoJSON output path
        #[arg(long, default_value = "states.geojson")]
        output: PathBuf,
    },
    /// Load the counties of one region
    Counties {
        /// Region name (case-insensitive)
        #[arg(long)]
        region: String,
        /// GeoJSON output path (defaults to `<region>_counties.geojson`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load every county nationwide in ID batches
    AllCounties {
        /// GeoJSON output path
        #[arg(long, default_value = "counties.geojson")]
        output: PathBuf,
    },
    /// Find the state and region under a point
    Locate {
        /// Longitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Latitude in degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Color a region's counties by population
    Classify {
        /// Region name (case-insensitive)
        #[arg(long)]
        region: String,
        /// "Quantile", "Equal Interval", or "Natural Breaks (Jenks)"
        #[arg(long, default_value = "Quantile")]
        method: String,
        /// Number of classes
        #[arg(long, default_value_t = DEFAULT_CLASSES)]
        classes: usize,
        /// Color scheme (Reds, Blues, Greens, Oranges, Purples, YlOrRd, RdYlBu)
        #[arg(long, default_value = "Reds", value_parser = ColorScheme::from_str)]
        scheme: ColorScheme,
        /// GeoJSON output path (defaults to `<region>_choropleth.geojson`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = region_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let session = Arc::new(MapSession::from_config_file(cli.config.as_deref())?);

    match cli.command {
        Commands::Regions => list_regions(&session),
        Commands::States { output } => {
            let states = load_states(&session, &multi).await?;
            write_states(&session, &states.collection, &output)?;
        }
        Commands::Counties { region, output } => {
            let counties = load_region(&session, &multi, &region).await?;
            let output = output.unwrap_or_else(|| default_output(&region, "counties"));
            write_geojson(&output, &to_geojson_with(&counties, label_properties))?;
            println!("{} counties written to {}", counties.len(), output.display());
        }
        Commands::AllCounties { output } => {
            let progress = IndicatifProgress::batches_bar(&multi, "Counting counties...");
            let counties = session
                .load_all_counties(&*progress, &Cancellation::new())
                .await?;
            write_geojson(&output, &to_geojson_with(&counties, label_properties))?;
            println!("{} counties written to {}", counties.len(), output.display());
        }
        Commands::Locate { lon, lat } => {
            load_states(&session, &multi).await?;
            match session.state_at(lon, lat) {
                Some(state) => {
                    let region = session
                        .region_at(lon, lat)
                        .map_or("(no region)", |r| r.name.as_str());
                    println!("{lon}, {lat}: {} / {region}", state.name());
                }
                None => println!("{lon}, {lat}: outside every state"),
            }
        }
        Commands::Classify {
            region,
            method,
            classes,
            scheme,
            output,
        } => {
            let counties = load_region(&session, &multi, &region).await?;
            let method = ClassificationMethod::from_name(&method);
            let output = output.unwrap_or_else(|| default_output(&region, "choropleth"));
            classify_counties(&counties, method, classes, scheme, &output)?;
        }
    }

    Ok(())
}

fn list_regions(session: &MapSession) {
    for region in session.regions().regions() {
        println!(
            "{:<10} {}  {} states",
            region.name,
            region.color,
            region.states.len()
        );
        println!("           {}", region.states.join(", "));
    }
}

async fn load_states(
    session: &MapSession,
    multi: &MultiProgress,
) -> Result<Arc<region_map_session::StateLayer>, Box<dyn std::error::Error>> {
    let progress = IndicatifProgress::batches_bar(multi, "Loading states...");
    let states = session.load_states(&*progress, &Cancellation::new()).await?;
    Ok(states)
}

/// Runs a region load in the background, mirroring its events on a bar.
/// Ctrl-C stops the load after the batch in flight.
async fn load_region(
    session: &Arc<MapSession>,
    multi: &MultiProgress,
    region: &str,
) -> Result<Arc<FeatureCollection>, Box<dyn std::error::Error>> {
    let mut task: LoadTask<Arc<FeatureCollection>> = session.spawn_region_load(region);

    let cancel = task.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling load");
            cancel.cancel();
        }
    });

    let bar = IndicatifProgress::percent_bar(multi, &format!("Loading {region} counties..."));
    while let Some(event) = task.events.recv().await {
        bar.apply(event);
    }
    let result = task.join().await;
    interrupt.abort();

    if result.is_err() {
        bar.clear();
    }
    Ok(result?)
}

fn write_states(
    session: &MapSession,
    states: &FeatureCollection,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let regions = session.regions();
    let geojson = to_geojson_with(states, |i, feature| {
        let mut properties = label_properties(i, feature);
        let name = feature.name();
        properties.insert(
            "region".to_string(),
            regions
                .region_of_state(name)
                .map_or(Value::Null, |r| Value::String(r.name.clone())),
        );
        properties.insert("fill".to_string(), json!(regions.state_color(name)));
        properties
    });
    write_geojson(output, &geojson)?;
    println!("{} states written to {}", states.len(), output.display());
    Ok(())
}

fn classify_counties(
    counties: &FeatureCollection,
    method: ClassificationMethod,
    classes: usize,
    scheme: ColorScheme,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let values: Vec<f64> = counties
        .iter()
        .map(|f| f.properties.measure().unwrap_or(0.0))
        .collect();
    let layer = ChoroplethLayer::build(&values, method, classes);

    let geojson = to_geojson_with(counties, |i, feature| {
        let mut properties = label_properties(i, feature);
        properties.insert(
            "class".to_string(),
            layer.classes[i].map_or(Value::Null, |c| json!(c)),
        );
        properties.insert("fill".to_string(), json!(layer.fill(i, scheme)));
        properties
    });
    write_geojson(output, &geojson)?;

    println!("{method} ({} classes, {scheme})", layer.breaks.len());
    for entry in layer.legend(scheme) {
        println!("  {}  {}", entry.color, entry.label);
    }
    let no_data = layer.no_data_count();
    if no_data > 0 {
        println!("  {NO_DATA_COLOR}  {NO_DATA_LABEL} ({no_data})");
    }
    println!("{} counties written to {}", counties.len(), output.display());
    Ok(())
}

fn label_properties(_index: usize, feature: &Feature) -> serde_json::Map<String, Value> {
    let mut properties = serde_json::Map::new();
    if let Some([lon, lat]) = label_point(&feature.geometry) {
        properties.insert("label".to_string(), json!([lon, lat]));
    }
    properties
}

fn default_output(region: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}_{suffix}.geojson",
        region.trim().to_lowercase().replace(' ', "_")
    ))
}
