//! Test module for nexus-router
//!
//! Property-based tests (proptest) for error mapping and router compilation.
