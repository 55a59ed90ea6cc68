//! Maintainer tests
//!
//! Event application against real source collections, and the failure
//! handling around it: fatal events, reconnects, store errors, shutdown.

mod test_supervision;
