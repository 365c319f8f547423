//! Upload admission: form reading, metadata extraction and the pipeline.

pub mod form;
pub mod metadata;
pub mod pipeline;

pub use form::{read_form, FormFile, UploadForm};
pub use metadata::{extract_metadata, MetadataError};
pub use pipeline::{Admission, AdmissionPipeline, UploadContext, UploadData, UploadResponse};
