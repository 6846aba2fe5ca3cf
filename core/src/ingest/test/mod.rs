pub mod concurrency;
pub mod util;
