pub mod common;
pub mod counter;
pub mod group;
pub mod project;
pub mod report;
