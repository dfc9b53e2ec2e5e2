//! BLAKE3 content hashes for archives and extracted directories

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 4096;

/// Hex digest of a single file
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    update_file(&mut hasher, path)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex digest over several files, fed in the given order into one state
pub fn hash_files<P: AsRef<Path>>(paths: &[P]) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        update_file(&mut hasher, path.as_ref())?;
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex digest of a directory's entries
///
/// Entries are visited in case-insensitive name order. Each contributes its
/// name, then its content for files. Subdirectories are descended into only
/// when `recursive` is set.
pub fn hash_directory(dir: &Path, recursive: bool) -> io::Result<String> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is not a directory", dir.display()),
        ));
    }
    let mut hasher = blake3::Hasher::new();
    update_directory(&mut hasher, dir, recursive)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn update_file(hasher: &mut blake3::Hasher, path: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buffer = [0_u8; CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            return Ok(());
        }
        hasher.update(&buffer[..read]);
    }
}

fn update_directory(hasher: &mut blake3::Hasher, dir: &Path, recursive: bool) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| (e.file_name().to_string_lossy().to_string(), e.path())))
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort_by(|(a, _), (b, _)| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));

    for (name, path) in entries {
        hasher.update(name.as_bytes());
        if path.is_file() {
            update_file(hasher, &path)?;
        } else if path.is_dir() && recursive {
            update_directory(hasher, &path, recursive)?;
        }
    }
    Ok(())
}
