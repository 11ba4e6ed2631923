use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Watershed data-preparation CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "hydroprep", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and unpack the source hydrography archives
    #[cfg(feature = "fetch")]
    Fetch(FetchArgs),

    /// Harmonize hydrography layers into tagged base stores
    Harmonize(HarmonizeArgs),

    /// Assign a feature layer through the HUC8-HUC10-HUC12-catchment hierarchy
    Assign(AssignArgs),

    /// Join water-quality CSVs and run hot-spot analysis over the sites
    Hotspot(HotspotArgs),
}

#[cfg(feature = "fetch")]
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Root directory receiving the unpacked datasets
    #[arg(value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Overwrite archives that already exist (off by default)
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct HarmonizeArgs {
    /// Directory of watershed subdirectories (each holding WBDHU8/10/12,
    /// NHDFlowline, NHDWaterbody, and Catchment shapefiles)
    #[arg(value_hint = ValueHint::DirPath)]
    pub data_dir: PathBuf,

    /// Region-of-interest boundary shapefile; all layers are clipped to it
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub boundary: PathBuf,

    /// Output directory for the harmonized base layers
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Exclusion rules document (JSON); nothing is dropped without one
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub rules: Option<PathBuf>,

    /// EPSG code every layer is reprojected to before comparison
    #[arg(long, default_value_t = 4326)]
    pub epsg: u32,
}

#[derive(Args, Debug)]
pub struct AssignArgs {
    /// Source feature shapefile (e.g. vectorized land cover)
    #[arg(value_hint = ValueHint::FilePath)]
    pub source: PathBuf,

    /// Directory of harmonized base layers (output of `harmonize`)
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub base_dir: PathBuf,

    /// Output directory; one tagged shapefile per hierarchy level
    #[arg(short, long, value_hint = ValueHint::DirPath)]
    pub out: PathBuf,

    /// Name of the source value column
    #[arg(long, default_value = "raster_val")]
    pub value_field: String,

    /// Drop features whose value column is zero (raster background)
    #[arg(long)]
    pub drop_zero: bool,

    /// EPSG code the assignment runs in
    #[arg(long, default_value_t = 4326)]
    pub epsg: u32,
}

#[derive(Args, Debug)]
pub struct HotspotArgs {
    /// Monitoring-station CSV (Water Quality Portal station table)
    #[arg(value_hint = ValueHint::FilePath)]
    pub stations: PathBuf,

    /// Observation CSVs, stacked and joined to the stations
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    pub results: Vec<PathBuf>,

    /// Output shapefile of sites with gi_z/gi_p columns
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: PathBuf,

    /// Analysis field in the observation tables
    #[arg(long, default_value = "ResultMeasureValue")]
    pub field: String,

    /// Longitude column in the station table
    #[arg(long, default_value = "LongitudeMeasure")]
    pub lon: String,

    /// Latitude column in the station table
    #[arg(long, default_value = "LatitudeMeasure")]
    pub lat: String,

    /// Fixed distance band, in units of the target CRS
    #[arg(long)]
    pub band: f64,

    /// Metric EPSG the sites are projected to before distance computation
    #[arg(long, default_value_t = 3071)]
    pub epsg: u32,
}
