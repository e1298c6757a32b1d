//! Fixtures shared by the unit tests.

use serde_json::{json, Value};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

/// Build an in-memory zip from `(path, contents)` pairs.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, contents) in entries {
        zip.start_file(*path, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// A plugin archive with a manifest and one dll, the way Thunderstore ships them.
pub fn plugin_archive(name: &str, version: &str, dependencies: &[&str]) -> Vec<u8> {
    let manifest = json!({
        "name": name,
        "version_number": version,
        "website_url": "",
        "dependencies": dependencies,
    })
    .to_string();
    let dll = format!("{name}.dll");
    zip_bytes(&[
        ("manifest.json", manifest.as_bytes()),
        ("icon.png", b"png"),
        ("README.md", b"# readme"),
        (dll.as_str(), b"MZ"),
    ])
}

/// Directory listing entry for a package with a single version.
pub fn package_json(
    owner: &str,
    name: &str,
    version: &str,
    created: &str,
    dependencies: &[&str],
    download_url: &str,
) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}-{name}"),
        "owner": owner,
        "categories": [],
        "versions": [{
            "name": name,
            "full_name": format!("{owner}-{name}-{version}"),
            "version_number": version,
            "dependencies": dependencies,
            "download_url": download_url,
            "date_created": created,
            "file_size": 0,
        }],
    })
}
