//! Image records.
//!
//! The rendition service needs exactly two things from the outside world: a
//! way to resolve an image id to a record, and the original bytes behind it.
//! [`ImageRecords`] provides both. [`JsonRecordStore`] is the file-backed
//! implementation and [`Uploader`] is the pipeline that fills it.

mod json_store;
mod store;
mod upload;

pub use json_store::JsonRecordStore;
pub use store::{ImageRecord, ImageRecords};
pub use upload::{
    extension_for, slugify, storage_name, UploadFile, Uploader, DEFAULT_ALLOW_TYPES,
};
