//! Storage layer tests
//!
//! Every chunk store backend must answer the same lookups the same way.

mod test_backends;
