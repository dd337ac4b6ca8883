mod download;
mod filename;

pub use download::{DownloadContext, download_episode, download_file, partial_path};
pub use filename::{
    EXTRACTION_FIELDS, ExtractionRule, FilenameStrategy, extraction_fields, feed_directory_name,
    media_extension, sanitize_title,
};
