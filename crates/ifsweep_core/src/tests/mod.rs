//! Integration tests for the sweep scheduler
//!
//! Tests are organized by topic:
//! - `fixtures` - Seeded run stores, scripted engine and converter
//! - `combinations` - Combination stream size, order and laziness
//! - `scenario` - Scenario file rendering
//! - `run_store` - Coefficient injection and blob export
//! - `pipeline` - Per-combination pipeline, end to end
//! - `pool` - Bounded queue, close signals and worker pool behaviour

mod fixtures;
mod pool;
