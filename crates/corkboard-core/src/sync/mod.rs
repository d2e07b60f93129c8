//! Live message collection: cached reads and store-echoed writes.

pub mod live;
pub mod writer;

pub use live::{BoardView, LiveCollectionSync, SubscriptionHandle};
pub use writer::MessageWriter;
