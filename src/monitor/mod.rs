pub mod audit_log;
pub mod monitoring_loop;
pub mod poll_timer;
