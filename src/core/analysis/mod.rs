mod duplicates;
mod quality;

pub use duplicates::{content_hash, DuplicateTracker};
pub use quality::{blur_score, check_quality};

#[cfg(test)]
pub(crate) use quality::tests::{checkerboard, flat};
