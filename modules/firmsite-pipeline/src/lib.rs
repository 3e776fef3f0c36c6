pub mod cache;
pub mod categorize;
pub mod discovery;
pub mod documents;
pub mod scheduler;
pub mod scrape;
pub mod seed;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod urls;
