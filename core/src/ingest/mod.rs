pub mod artifacts;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod request;
pub mod source;
pub mod title;

#[cfg(test)]
mod test;

pub use error::{IngestError, IngestErrorKind};
pub use pipeline::{IngestCommands, IngestPipeline};
pub use policy::NormalizePolicy;
pub use request::{IngestRequest, UploadedFile};
