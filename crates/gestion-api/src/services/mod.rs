//! Service layer between the handler and the store adapters.

pub mod file_materializer;
pub mod record_resolver;

pub use file_materializer::FileMaterializer;
pub use record_resolver::RecordResolver;
