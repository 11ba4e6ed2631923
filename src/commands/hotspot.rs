use anyhow::{Context, Result};

use crate::cli::{Cli, HotspotArgs};
use crate::hotspot::{attach_stats, GiStarEngine, HotSpotEngine, HotSpotOptions};
use crate::sites;

/// Join the water-quality CSVs into mapped monitoring sites and score them
/// with the hot-spot engine.
pub fn run(cli: &Cli, args: &HotspotArgs) -> Result<()> {
    let stations = sites::read_csv(&args.stations)?;
    let results = args
        .results
        .iter()
        .map(|path| sites::read_csv(path))
        .collect::<Result<Vec<_>>>()?;

    let joined = sites::join_observations(&stations, &results)?;
    if cli.verbose > 0 {
        eprintln!("[hotspot] {} observations joined to stations", joined.height());
    }

    // Station coordinates arrive as lon/lat; distances need a metric CRS.
    let points = sites::to_point_store(&joined, &args.lon, &args.lat, &args.field, 4326)?
        .reproject(args.epsg)
        .context("projecting sites for distance computation")?;

    let stats = GiStarEngine.compute(
        &points,
        "value",
        &HotSpotOptions { distance_band: args.band },
    )?;
    let scored = attach_stats(&points, &stats)?;
    scored.write(&args.out)?;

    let significant = stats.iter().filter(|s| s.p_value < 0.05).count();
    println!(
        "Scored {} sites ({} significant at p<0.05) -> {}",
        scored.len(),
        significant,
        args.out.display()
    );
    Ok(())
}
