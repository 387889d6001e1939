// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Size-based rotation of log files

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use module_utils::pingora::{Error, ErrorType};
use module_utils::COMPRESSION_ERROR;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn write_archive(source: &Path, entry_name: &OsStr, archive: &Path) -> std::io::Result<()> {
    let file = File::create(archive)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.append_path_with_name(source, entry_name)?;
    builder.into_inner()?.finish()?;
    Ok(())
}

/// Packs a file into a gzip-compressed tar archive containing only this file.
///
/// If packing fails, any partially written archive is removed and an error of type
/// [`COMPRESSION_ERROR`] is returned. The source file is never modified.
pub fn compress(source: &Path, archive: &Path) -> Result<(), Box<Error>> {
    let entry_name = source.file_name().unwrap_or(source.as_os_str());
    if let Err(err) = write_archive(source, entry_name, archive) {
        if archive.is_file() {
            let _ = fs::remove_file(archive);
        }
        return Err(Error::because(
            COMPRESSION_ERROR,
            format!(
                "failed compressing {} into {}",
                source.display(),
                archive.display()
            ),
            err,
        ));
    }
    Ok(())
}

/// Rotates the file if it is larger than `max_bytes`.
///
/// The file is renamed to `<name>.<uuid>`, an empty file is created under the original name and
/// the renamed file is compressed into `<name>.<uuid>.tar.gz`. Returns the archive path if the
/// file was rotated.
///
/// If compression fails, the renamed file is kept and an error of type [`COMPRESSION_ERROR`]
/// returned. The original file is empty at this point and can be written to.
pub fn rotate_if_needed(path: &Path, max_bytes: u64) -> Result<Option<PathBuf>, Box<Error>> {
    rotate_if_needed_with(path, max_bytes, new_suffix)
}

/// Unique suffix for a rotated file
pub(crate) fn new_suffix() -> String {
    Uuid::new_v4().to_string()
}

/// Like [`rotate_if_needed`], with the suffix of the rotated file produced by `suffix`.
pub(crate) fn rotate_if_needed_with<F>(
    path: &Path,
    max_bytes: u64,
    suffix: F,
) -> Result<Option<PathBuf>, Box<Error>>
where
    F: FnOnce() -> String,
{
    let size = match fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(Error::because(
                ErrorType::InternalError,
                format!("failed checking size of {}", path.display()),
                err,
            ))
        }
    };

    if size <= max_bytes {
        return Ok(None);
    }

    debug!("{} has {size} bytes, rotating", path.display());
    rotate(path, &suffix()).map(Some)
}

pub(crate) fn rotate(path: &Path, suffix: &str) -> Result<PathBuf, Box<Error>> {
    let name = path
        .file_name()
        .ok_or_else(|| {
            Error::explain(
                ErrorType::InternalError,
                format!("cannot rotate {}, not a file path", path.display()),
            )
        })?
        .to_string_lossy();
    let rotated = path.with_file_name(format!("{name}.{suffix}"));
    let archive = path.with_file_name(format!("{name}.{suffix}.tar.gz"));

    fs::rename(path, &rotated).map_err(|err| {
        Error::because(
            ErrorType::InternalError,
            format!("failed renaming {} to {}", path.display(), rotated.display()),
            err,
        )
    })?;

    File::create(path).map_err(|err| {
        Error::because(
            ErrorType::FileOpenError,
            format!("failed recreating {}", path.display()),
            err,
        )
    })?;

    compress(&rotated, &archive)?;

    if let Err(err) = fs::remove_file(&rotated) {
        warn!(
            "failed removing {} after compression: {err}",
            rotated.display()
        );
    }

    Ok(archive)
}
