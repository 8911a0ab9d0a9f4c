//! Process wiring for `monitor-service`: configuration discovery, adapter
//! construction and logging setup.

pub mod runtime;
