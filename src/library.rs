//! Local library: tracks, tag reading, directory scanning and the index.

mod display;
mod index;
mod model;
mod scan;
mod tags;

pub use display::render_fields;
pub use index::{LibraryIndex, ScanSummary};
pub use model::Track;
pub use scan::{STAGING_PREFIX, is_staging_dir, scan, scan_with};
pub use tags::{LoftyReader, TagInfo, TagReader};
