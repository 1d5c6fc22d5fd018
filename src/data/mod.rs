pub mod models;
pub mod schedule;
pub mod status;
pub mod upstream;
