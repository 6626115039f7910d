use crate::StoreError;
use std::fs;
use std::io::{self, Read};
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

/// Stream `source` into `dest` with permission bits `mode`, creating parent
/// directories as needed.
pub fn write_to_file(source: &mut impl Read, dest: &Path, mode: u32) -> Result<u64, StoreError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(dest)?;
    let written = io::copy(source, &mut file)?;
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(written)
}

/// Copy a single file, keeping its permissions.
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64, StoreError> {
    let mut src = fs::File::open(source)?;
    let mode = src.metadata()?.permissions().mode();
    write_to_file(&mut src, dest, mode)
}

/// Recursively copy the contents of `source` into the existing directory
/// `dest`. Symlinks are recreated rather than followed.
pub fn copy_directory(source: &Path, dest: &Path) -> Result<(), StoreError> {
    if !dest.is_dir() {
        return Err(StoreError::MissingDestination(dest.to_path_buf()));
    }
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let src = entry.path();
        let target = dest.join(entry.file_name());
        let meta = src.symlink_metadata()?;

        if meta.file_type().is_symlink() {
            symlink(fs::read_link(&src)?, &target)?;
        } else if meta.is_dir() {
            fs::create_dir_all(&target)?;
            fs::set_permissions(&target, meta.permissions())?;
            copy_directory(&src, &target)?;
        } else {
            copy_file(&src, &target)?;
        }
    }
    Ok(())
}
