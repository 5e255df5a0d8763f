mod dataset;
mod label;

pub use dataset::{
    list_class_dirs, list_files, list_image_files, load_buckets, ClassBucket, DatasetSplit,
};
pub use label::{parse_label_file, LabelError};
