pub mod buckets;
pub mod builtins;

pub use buckets::CompletionBuckets;
pub use builtins::RoutineDictionary;
