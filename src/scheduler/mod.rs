pub mod clock;
pub mod daily;
