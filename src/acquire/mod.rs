//! Acquisition of the source hydrography archives: download, unpack the
//! members the pipeline needs, and discard the rest. One successful pass per
//! dataset; failures are surfaced, never retried (the remote data is static
//! and a failed unpack means the archive, not the run, is bad).

mod fs;

pub use fs::{ensure_dir_exists, extract_members};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// One remote archive and the members worth keeping out of it.
#[derive(Debug, Clone)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub url: &'static str,
    /// Member-name suffixes to extract (flattened into `dest`).
    pub keep: &'static [&'static str],
    /// Destination directory, relative to the acquisition root.
    pub dest: &'static str,
}

/// Watershed Boundary Dataset and county hydrography sources for the study
/// area (HU2 regions 04 and 07). The NHDPlus snapshot and catchment archives
/// ship as 7z and are staged by hand; everything zip-packaged is listed here.
pub fn hydrography_manifest() -> &'static [DatasetSpec] {
    const WBD_KEEP: &[&str] = &[
        "WBDHU8.shp", "WBDHU8.shx", "WBDHU8.dbf", "WBDHU8.prj",
        "WBDHU10.shp", "WBDHU10.shx", "WBDHU10.dbf", "WBDHU10.prj",
        "WBDHU12.shp", "WBDHU12.shx", "WBDHU12.dbf", "WBDHU12.prj",
    ];
    const SHAPE_KEEP: &[&str] = &[".shp", ".shx", ".dbf", ".prj", ".cpg", ".sbn"];

    &[
        DatasetSpec {
            name: "wbd-04",
            url: "https://prd-tnm.s3.amazonaws.com/StagedProducts/Hydrography/WBD/HU2/Shape/WBD_04_HU2_Shape.zip",
            keep: WBD_KEEP,
            dest: "watersheds/watershed4",
        },
        DatasetSpec {
            name: "wbd-07",
            url: "https://prd-tnm.s3.amazonaws.com/StagedProducts/Hydrography/WBD/HU2/Shape/WBD_07_HU2_Shape.zip",
            keep: WBD_KEEP,
            dest: "watersheds/watershed7",
        },
        DatasetSpec {
            name: "dane-hydrologic-units",
            url: "https://dciimages.countyofdane.com/WaterResources/HydrologicUnits.zip",
            keep: SHAPE_KEEP,
            dest: "dane_county",
        },
        DatasetSpec {
            name: "dane-internally-drained",
            url: "https://dciimages.countyofdane.com/WaterResources/InternallyDrained.zip",
            keep: SHAPE_KEEP,
            dest: "dane_county",
        },
    ]
}

/// Fetch a URL into memory.
pub fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("fetching {url}"))?;
    let bytes = response.bytes().with_context(|| format!("reading body of {url}"))?;
    Ok(bytes.to_vec())
}

/// Download `url` to `out_path` through a temp file in the same directory,
/// renaming only once the body is fully written.
pub fn download_file(url: &str, out_path: &Path, force: bool) -> Result<()> {
    use std::io::Write;

    if out_path.exists() && !force {
        anyhow::bail!(
            "refusing to overwrite existing file: {} (use --force)",
            out_path.display()
        );
    }
    if let Some(parent) = out_path.parent() {
        ensure_dir_exists(parent)?;
    }

    let bytes = fetch_bytes(url)?;
    let mut tmp = tempfile::NamedTempFile::new_in(
        out_path.parent().unwrap_or_else(|| Path::new(".")),
    )
    .context("create temp file")?;
    tmp.write_all(&bytes).context("write downloaded bytes")?;
    tmp.persist(out_path)
        .with_context(|| format!("rename to {}", out_path.display()))?;
    Ok(())
}

/// Run the full manifest: download each archive under `root`, extract the
/// wanted members into the dataset's destination directory, and remove the
/// archive after a successful unpack.
pub fn run_manifest(root: &Path, force: bool, verbose: u8) -> Result<()> {
    for dataset in hydrography_manifest() {
        let archive_name = dataset
            .url
            .rsplit('/')
            .next()
            .expect("manifest urls always have a file component");
        let archive_path: PathBuf = root.join(archive_name);
        let dest = root.join(dataset.dest);

        if verbose > 0 {
            eprintln!("[fetch:{}] {} -> {}", dataset.name, dataset.url, dest.display());
        }

        download_file(dataset.url, &archive_path, force)
            .with_context(|| format!("downloading dataset {:?}", dataset.name))?;
        extract_members(&archive_path, dataset.keep, &dest, true)
            .with_context(|| format!("unpacking dataset {:?}", dataset.name))?;
    }
    Ok(())
}
