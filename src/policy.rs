//! Per-object metadata policy: content type from the file extension,
//! cache lifetime from the content type.
//!
//! Both mappings are pure tables. HTML documents are the mutable entry
//! points of a deployed site and get a short lifetime; every other asset is
//! assumed content-hashed by the build and cached for a day.

use std::path::Path;

use crate::walk::FileEntry;

/// Fallback for extensions the table does not know.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Cache policy for `text/html`.
pub const CACHE_CONTROL_DOCUMENT: &str = "public, max-age=3600";

/// Cache policy for everything that is not `text/html`.
pub const CACHE_CONTROL_ASSET: &str = "public, max-age=86400";

/// The unit of upload: one remote object derived from one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpec {
    pub key: String,
    pub content_type: &'static str,
    pub cache_control: &'static str,
    pub source_path: std::path::PathBuf,
}

/// Derive the object to upload from a walked file entry.
pub fn object_spec(entry: FileEntry) -> ObjectSpec {
    let content_type = content_type_for(&entry.path);
    ObjectSpec {
        key: entry.relative_key,
        content_type,
        cache_control: cache_control_for(content_type),
        source_path: entry.path,
    }
}

/// MIME type for a path, by extension, case-insensitive.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_ascii_lowercase(),
        None => return DEFAULT_CONTENT_TYPE,
    };
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "map" => "application/json",
        "webmanifest" => "application/manifest+json",
        "wasm" => "application/wasm",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Two-tier cache boundary: exactly `text/html` is the document tier.
pub fn cache_control_for(content_type: &str) -> &'static str {
    if content_type == "text/html" {
        CACHE_CONTROL_DOCUMENT
    } else {
        CACHE_CONTROL_ASSET
    }
}
