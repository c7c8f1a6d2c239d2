pub mod extractor;
pub mod fetcher;
pub mod matcher;
pub mod reconciler;
pub mod resolver;
pub mod scheduler;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
