mod id_types;
mod media_record;
pub use id_types::*;
pub use media_record::*;
