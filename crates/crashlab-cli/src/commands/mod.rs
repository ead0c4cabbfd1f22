pub mod build;
pub mod completions;
pub mod config;
pub mod interactive;
pub mod list;
pub mod meta;
pub mod report;
pub mod run;
pub mod schedule;
pub mod trigger;
