mod file_ops;
mod image_io;
mod quarantine;

pub use file_ops::copy_into;
pub use image_io::{resize_exact, save_rgb};
pub use quarantine::{Quarantine, QuarantineOutcome};
