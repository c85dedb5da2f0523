pub mod fixtures;
pub mod mocks;

#[allow(unused_imports)]
pub use fixtures::{csv_feed, record_updated_at, HEADER};
#[allow(unused_imports)]
pub use mocks::StaticFeeds;
