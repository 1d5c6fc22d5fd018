//! Player entry detection.

pub mod entry_detector;
pub mod evidence;
