//! Indexer layer tests
//!
//! Bucket and chunk properties of the pure text functions, and
//! character-safe handling of multi-byte text.

mod test_properties;
