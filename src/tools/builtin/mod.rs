//! Built-in tools.

mod scan_url;

pub use scan_url::{SCAN_URL_TOOL, ScanUrlTool};
