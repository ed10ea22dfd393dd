//! atomically integration tests.

mod support;

mod collapsing;
mod flush_failure;
mod nesting;
