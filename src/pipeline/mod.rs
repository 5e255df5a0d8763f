//! One module per pipeline stage. Each stage takes explicit paths and
//! settings, logs as it goes and returns a serializable summary.

pub mod clean;
pub mod convert;
pub mod count;
pub mod quota;
pub mod reduce;
pub mod report;
pub mod resize;
pub mod split;

pub use clean::run_clean_stage;
pub use convert::run_convert_stage;
pub use count::count_images;
pub use quota::{run_quota_stage, QuotaOptions};
pub use reduce::run_reduce_stage;
pub use report::write_report;
pub use resize::run_resize_stage;
pub use split::run_split_stage;
