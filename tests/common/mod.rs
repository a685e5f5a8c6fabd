// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;

use missionpack::filesystem::FileSystem;
use missionpack::progress::ProgressListener;
use missionpack::record;
use missionpack::{ContentResolver, ImportOutcome, Manifest, RecordImporter};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// A record for `uid`, optionally depending on a `parent` record
pub fn record_text(uid: &str, parent: Option<&str>) -> String {
    match parent {
        Some(parent) => format!(
            "<event uid=\"{uid}\" parent=\"{parent}\" type=\"b-m-r\"><point lat=\"1.0\" lon=\"2.0\"/></event>"
        ),
        None => format!(
            "<event uid=\"{uid}\" type=\"a-f-G\"><point lat=\"1.0\" lon=\"2.0\"/></event>"
        ),
    }
}

/// Content resolver over an in-memory map of uid -> record text
#[derive(Default)]
pub struct MapResolver {
    records: HashMap<String, String>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, uid: &str, text: String) -> Self {
        self.records.insert(uid.to_string(), text);
        self
    }
}

impl ContentResolver for MapResolver {
    fn resolve(&self, uid: &str) -> Option<String> {
        self.records.get(uid).cloned()
    }

    fn point_count(&self, uid: &str) -> Option<usize> {
        self.records.get(uid).map(|text| record::point_count(text))
    }
}

/// Resolver that cancels the build once it has resolved `after` records
pub struct CancellingResolver<'a> {
    pub inner: MapResolver,
    pub progress: &'a dyn ProgressListener,
    pub after: usize,
    calls: Cell<usize>,
}

impl<'a> CancellingResolver<'a> {
    pub fn new(inner: MapResolver, progress: &'a dyn ProgressListener, after: usize) -> Self {
        Self {
            inner,
            progress,
            after,
            calls: Cell::new(0),
        }
    }
}

impl ContentResolver for CancellingResolver<'_> {
    fn resolve(&self, uid: &str) -> Option<String> {
        let calls = self.calls.get() + 1;
        self.calls.set(calls);
        if calls == self.after {
            self.progress.cancel("test cancellation");
        }
        self.inner.resolve(uid)
    }
}

/// Importer that defers records whose `parent` has not been imported yet
#[derive(Default)]
pub struct DependentImporter {
    pub imported: Vec<String>,
    present: HashSet<String>,
}

impl RecordImporter for DependentImporter {
    fn import(&mut self, uid: &str, text: &str, _manifest: &Manifest) -> ImportOutcome {
        let parent = record::scan_attribute(text, "parent");
        if !parent.is_empty() && !self.present.contains(&parent) {
            return ImportOutcome::Deferred;
        }
        self.present.insert(uid.to_string());
        self.imported.push(uid.to_string());
        ImportOutcome::Imported
    }
}

/// Entry names of an archive, in archive order
pub fn entry_names(fs: &dyn FileSystem, path: &Path) -> Vec<String> {
    let archive = ZipArchive::new(fs.open_read(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

/// Contents of one archive entry
pub fn entry_bytes(fs: &dyn FileSystem, path: &Path, name: &str) -> Vec<u8> {
    let mut archive = ZipArchive::new(fs.open_read(path).unwrap()).unwrap();
    let mut bytes = Vec::new();
    archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
    bytes
}

/// Write a plain zip archive without a manifest
pub fn write_plain_zip(fs: &dyn FileSystem, path: &Path, entries: &[(&str, &[u8])]) {
    let mut zip = ZipWriter::new(fs.open_write(path).unwrap());
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
}
