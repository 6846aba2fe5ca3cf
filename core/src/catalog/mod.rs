pub mod store;

pub use store::{CatalogError, CatalogHandle};
