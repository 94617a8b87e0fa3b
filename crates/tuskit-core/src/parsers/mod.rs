//! Header parsers for the tus extension headers.

pub mod checksum;
pub mod metadata;
pub mod upload_concat;

pub use checksum::Checksum;
pub use metadata::{Metadata, MetadataMap, MetadataParseError, MetadataParsingStrategy, parse_metadata};
pub use upload_concat::{UploadConcat, UploadConcatParseError, parse_upload_concat};
