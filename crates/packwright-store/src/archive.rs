use crate::util::write_to_file;
use crate::StoreError;
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::os::unix::fs::symlink;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Extract a gzip-compressed tarball at `archive` into `dest`.
pub fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    strip_components: usize,
) -> Result<(), StoreError> {
    let file = fs::File::open(archive)?;
    extract_tar(GzDecoder::new(file), dest, strip_components)
}

/// Extract a tar stream into `dest`, dropping the first `strip_components`
/// path components of every entry.
///
/// Regular files, directories, symlinks and hard links are supported; other
/// entry types are skipped with a warning. Entries whose path would land
/// outside `dest` (absolute paths, `..`, or writes through a symlink that
/// points elsewhere) are rejected.
pub fn extract_tar(
    reader: impl Read,
    dest: &Path,
    strip_components: usize,
) -> Result<(), StoreError> {
    fs::create_dir_all(dest)?;
    let dest_canonical = dest.canonicalize()?;
    let mut ar = tar::Archive::new(reader);

    for entry in ar.entries()? {
        let mut entry = entry?;
        let raw = entry.path()?.to_string_lossy().into_owned();
        let Some(relative) = strip(&raw, strip_components, dest)? else {
            continue;
        };
        let target = dest.join(&relative);
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            ensure_inside(&target, &dest_canonical, &raw)?;
            fs::create_dir_all(&target)?;
            continue;
        }

        let parent = target.parent().unwrap_or(dest);
        ensure_inside(parent, &dest_canonical, &raw)?;
        fs::create_dir_all(parent)?;

        if kind.is_symlink() {
            let Some(link) = entry.link_name()? else {
                warn!("skipping symlink without target: {raw}");
                continue;
            };
            symlink(&*link, &target)?;
        } else if kind.is_hard_link() {
            let Some(link) = entry.link_name()? else {
                warn!("skipping hard link without target: {raw}");
                continue;
            };
            let link = link.to_string_lossy().into_owned();
            let Some(link_rel) = strip(&link, strip_components, dest)? else {
                warn!("skipping hard link to stripped path: {raw}");
                continue;
            };
            let source = dest.join(link_rel);
            ensure_inside(&source, &dest_canonical, &raw)?;
            fs::hard_link(source, &target)?;
        } else if kind.is_file() || kind == tar::EntryType::Continuous {
            ensure_inside(&target, &dest_canonical, &raw)?;
            let mode = entry.header().mode().unwrap_or(0o644);
            write_to_file(&mut entry, &target, mode)?;
        } else {
            warn!("skipping unsupported entry type {kind:?}: {raw}");
        }
    }
    debug!(dest = %dest.display(), "extracted archive");
    Ok(())
}

/// Drop leading components and reject anything that is not a plain relative
/// path. Returns `None` for entries consumed entirely by stripping.
fn strip(raw: &str, strip_components: usize, dest: &Path) -> Result<Option<PathBuf>, StoreError> {
    let unsafe_entry = || StoreError::UnsafeArchiveEntry {
        entry: raw.to_owned(),
        dest: dest.to_path_buf(),
    };

    let mut kept = PathBuf::new();
    let mut seen = 0usize;
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => {
                if seen >= strip_components {
                    kept.push(part);
                }
                seen += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry());
            }
        }
    }
    if kept.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(kept))
    }
}

/// Check that `path` resolves inside `dest_canonical` without creating
/// anything: the deepest ancestor that already exists is canonicalized, so
/// a symlink laid down by an earlier entry is followed before any directory
/// is made through it.
fn ensure_inside(path: &Path, dest_canonical: &Path, raw: &str) -> Result<(), StoreError> {
    let unsafe_entry = || StoreError::UnsafeArchiveEntry {
        entry: raw.to_owned(),
        dest: dest_canonical.to_path_buf(),
    };

    let existing = path
        .ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .ok_or_else(unsafe_entry)?;
    // a dangling symlink cannot be resolved, so it cannot be trusted
    let resolved = existing.canonicalize().map_err(|_| unsafe_entry())?;
    if resolved.starts_with(dest_canonical) {
        Ok(())
    } else {
        Err(unsafe_entry())
    }
}
