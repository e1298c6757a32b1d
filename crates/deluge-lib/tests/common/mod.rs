#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{Cursor, Write};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

pub const INDEX_PATH: &str = "/c/riskofrain2/api/v1/package/";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// An ordinary plugin package: manifest, icon and one loose dll.
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
        (dll.as_str(), b"MZ"),
    ])
}

/// Shaped like bbepis-BepInExPack: everything under `BepInExPack/`.
pub fn bepinex_pack_archive() -> Vec<u8> {
    zip_bytes(&[
        ("manifest.json", b"{}"),
        ("BepInExPack/winhttp.dll", b"MZ"),
        ("BepInExPack/doorstop_config.ini", b"[UnityDoorstop]"),
        ("BepInExPack/BepInEx/core/BepInEx.Preloader.dll", b"MZ"),
    ])
}

/// Shaped like the RiskofThunder loader fixes: everything under `BepInEx/`.
pub fn loader_fix_archive(file: &str) -> Vec<u8> {
    let entry = format!("BepInEx/patchers/{file}");
    zip_bytes(&[("manifest.json", b"{}"), (entry.as_str(), b"MZ")])
}

pub fn version_json(version: &str, created: &str, deps: &[&str], url: &str) -> Value {
    json!({
        "version_number": version,
        "date_created": created,
        "dependencies": deps,
        "download_url": url,
        "file_size": 0,
    })
}

pub fn package_json(owner: &str, name: &str, versions: Vec<Value>) -> Value {
    json!({
        "name": name,
        "full_name": format!("{owner}-{name}"),
        "owner": owner,
        "categories": [],
        "versions": versions,
    })
}

pub fn archive_url(server: &MockServer, key: &str) -> String {
    format!("{}/archives/{}.zip", server.uri(), key)
}

pub fn index_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), INDEX_PATH)
}

pub async fn serve_index(server: &MockServer, packages: Vec<Value>, times: u64) {
    Mock::given(method("GET"))
        .and(path(INDEX_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(packages)))
        .expect(times)
        .mount(server)
        .await;
}

pub async fn serve_archive(server: &MockServer, key: &str, bytes: Vec<u8>, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/archives/{key}.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .expect(times)
        .mount(server)
        .await;
}
