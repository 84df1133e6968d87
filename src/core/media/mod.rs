pub mod extractor;
pub mod probe;

pub use extractor::{parse_file_info, MediaSummary};
pub use probe::{get_mediainfo_text, get_remote_size};
