pub mod config;
pub mod dataset;
pub mod error;
pub mod extractor;
pub mod images;
pub mod partition;
pub mod secrets;
pub mod subprocess;
pub mod toggle;

pub use config::{load_config, Config};
pub use dataset::{DatasetClient, IndexingOutcome, ProcessRule};
pub use error::{
    ConfigError, ConvertError, DatasetError, DocIngestError, ExtractError, ImageError,
    PartitionError, Result,
};
pub use extractor::{DocxExtractor, Document, Extractor, ExtractorRegistry, PdfExtractor};
pub use partition::{build_partitioner, Element, PartitionRequest, Partitioner};
pub use secrets::{SecretError, SecretSource};
