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

//! Mapping of URI paths to files

use percent_encoding::percent_decode_str;
use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};

#[cfg(unix)]
fn component_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    OsStr::from_bytes(bytes).into()
}

#[cfg(not(unix))]
fn component_from_bytes(bytes: &[u8]) -> PathBuf {
    // Non-Unicode file names cannot be addressed here and will produce 404.
    String::from_utf8_lossy(bytes).into_owned().into()
}

/// Resolves the path from a URI against a canonical root directory path.
///
/// Errors:
///
/// * [`ErrorKind::InvalidInput`]: the URI path doesn’t start with a slash
/// * [`ErrorKind::PermissionDenied`]: the path resolves to a location outside the root directory
/// * other errors of [`std::fs::canonicalize()`], typically [`ErrorKind::NotFound`]
pub fn resolve_uri(uri_path: &str, root: &Path) -> Result<PathBuf, Error> {
    let relative = uri_path
        .strip_prefix('/')
        .ok_or_else(|| Error::from(ErrorKind::InvalidInput))?;

    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        let decoded = percent_decode_str(segment).collect::<Vec<_>>();
        path.push(component_from_bytes(&decoded));
    }

    let path = path.canonicalize()?;
    if path.starts_with(root) {
        Ok(path)
    } else {
        Err(ErrorKind::PermissionDenied.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use test_log::test;

    #[test]
    fn resolution() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir(root.join("docs")).unwrap();
        fs::write(root.join("docs").join("read me.txt"), "hi").unwrap();
        fs::write(root.join("style.css"), "").unwrap();

        assert_eq!(resolve_uri("/", &root).unwrap(), root);
        assert_eq!(
            resolve_uri("/style.css", &root).unwrap(),
            root.join("style.css")
        );
        assert_eq!(resolve_uri("/docs/", &root).unwrap(), root.join("docs"));
        assert_eq!(
            resolve_uri("//docs//read%20me.txt", &root).unwrap(),
            root.join("docs").join("read me.txt")
        );
        assert_eq!(
            resolve_uri("/docs/../style%2ecss", &root).unwrap(),
            root.join("style.css")
        );
    }

    #[test]
    fn errors() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("www");
        fs::create_dir(&root).unwrap();
        fs::write(dir.path().join("secret.txt"), "").unwrap();
        let root = root.canonicalize().unwrap();

        assert_eq!(
            resolve_uri("style.css", &root).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            resolve_uri("/missing.html", &root).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            resolve_uri("/../secret.txt", &root).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            resolve_uri("/%2e%2e/secret.txt", &root).unwrap_err().kind(),
            ErrorKind::PermissionDenied
        );
    }
}
