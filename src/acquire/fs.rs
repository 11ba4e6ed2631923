use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use zip::ZipArchive;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Extract the archive members whose names end with one of `keep` into
/// `dest_dir`, flattening any internal directory structure. If `delete_after`
/// is true, removes the archive after a successful extraction.
pub fn extract_members(
    zip_path: &Path,
    keep: &[&str],
    dest_dir: &Path,
    delete_after: bool,
) -> Result<()> {
    let file = fs::File::open(zip_path)
        .with_context(|| format!("failed to open {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("failed to read zip archive {}", zip_path.display()))?;

    ensure_dir_exists(dest_dir)?;

    let mut extracted = 0usize;
    for i in 0..archive.len() {
        let mut member = archive.by_index(i)?;
        if member.is_dir() {
            continue;
        }
        let name = member.name().to_string();
        if !keep.iter().any(|suffix| name.ends_with(suffix)) {
            continue;
        }
        let file_name = name
            .rsplit(['/', '\\'])
            .next()
            .expect("member names are non-empty");
        let out_path = dest_dir.join(file_name);

        let mut out = fs::File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        std::io::copy(&mut member, &mut out)
            .with_context(|| format!("failed to extract {name} to {}", out_path.display()))?;
        extracted += 1;
    }

    if extracted == 0 {
        anyhow::bail!(
            "no wanted members found in {} (looked for {:?})",
            zip_path.display(),
            keep
        );
    }
    log::debug!("extracted {extracted} members from {}", zip_path.display());

    if delete_after {
        fs::remove_file(zip_path)
            .with_context(|| format!("failed to delete {}", zip_path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_archive(dir: &Path) -> std::path::PathBuf {
        let zip_path = dir.join("bundle.zip");
        let file = fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for name in ["Shape/WBDHU8.shp", "Shape/WBDHU8.dbf", "Shape/readme.txt"] {
            writer.start_file(name, options).unwrap();
            writer.write_all(b"payload").unwrap();
        }
        writer.finish().unwrap();
        zip_path
    }

    #[test]
    fn extracts_wanted_members_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_archive(dir.path());
        let dest = dir.path().join("out");

        extract_members(&zip_path, &["WBDHU8.shp", "WBDHU8.dbf"], &dest, true).unwrap();

        assert!(dest.join("WBDHU8.shp").exists());
        assert!(dest.join("WBDHU8.dbf").exists());
        assert!(!dest.join("readme.txt").exists());
        // Archive removed after successful unpack.
        assert!(!zip_path.exists());
    }

    #[test]
    fn errors_when_nothing_matches() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = make_archive(dir.path());
        let dest = dir.path().join("out");

        assert!(extract_members(&zip_path, &["Catchment.shp"], &dest, false).is_err());
        assert!(zip_path.exists());
    }
}
