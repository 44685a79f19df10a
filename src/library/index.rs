use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::LibrarySettings;
use crate::error::Result;

use super::model::Track;
use super::scan::{collect_audio_paths, modified_at, read_track, sort_tracks};
use super::tags::{LoftyReader, TagReader};

/// What changed during a rescan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    pub kept: usize,
}

/// The set of tracks found under the library root.
///
/// Every rescan is a full walk. Files whose modification time did not change
/// keep their existing `Track` value without being re-tagged.
pub struct LibraryIndex {
    root: PathBuf,
    settings: LibrarySettings,
    reader: Box<dyn TagReader>,
    tracks: Vec<Track>,
}

impl LibraryIndex {
    /// Index `root` with the `lofty` tag reader.
    pub fn open(root: impl Into<PathBuf>, settings: LibrarySettings) -> Result<Self> {
        Self::with_reader(root, settings, Box::new(LoftyReader))
    }

    pub fn with_reader(
        root: impl Into<PathBuf>,
        settings: LibrarySettings,
        reader: Box<dyn TagReader>,
    ) -> Result<Self> {
        let mut index = Self {
            root: root.into(),
            settings,
            reader,
            tracks: Vec::new(),
        };
        index.rescan()?;
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&Track> {
        self.tracks.iter().find(|t| t.path == path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Replace the collection with a fresh walk of the root.
    ///
    /// On `MissingDirectory` the previous collection is left untouched.
    pub fn rescan(&mut self) -> Result<ScanSummary> {
        let paths = collect_audio_paths(&self.root, &self.settings)?;

        let mut previous: HashMap<PathBuf, Track> = self
            .tracks
            .drain(..)
            .map(|t| (t.path.clone(), t))
            .collect();

        let mut summary = ScanSummary::default();
        let mut tracks = Vec::with_capacity(paths.len());
        for path in paths {
            match previous.remove(&path) {
                Some(old) if old.added_at == modified_at(&path) => {
                    summary.kept += 1;
                    tracks.push(old);
                }
                Some(_) => {
                    summary.updated += 1;
                    tracks.push(read_track(&path, &self.settings, self.reader.as_ref()));
                }
                None => {
                    summary.added += 1;
                    tracks.push(read_track(&path, &self.settings, self.reader.as_ref()));
                }
            }
        }
        summary.removed = previous.len();

        sort_tracks(&mut tracks);
        self.tracks = tracks;

        info!(
            root = %self.root.display(),
            total = self.tracks.len(),
            added = summary.added,
            removed = summary.removed,
            updated = summary.updated,
            "library indexed"
        );
        Ok(summary)
    }

    /// Bring freshly written files into the index and return the ones it
    /// picked up.
    ///
    /// This is a full rescan. A file missing from the result is not something
    /// the library indexes (wrong extension, hidden, outside the walk depth).
    pub fn incorporate(&mut self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        self.rescan()?;
        Ok(paths.iter().filter(|p| self.contains(p)).cloned().collect())
    }
}
