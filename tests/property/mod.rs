//! Property-based tests for retention, ordering and ingestion rules

mod ring_buffer;
