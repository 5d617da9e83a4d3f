pub mod document_render;
pub mod load_record;
pub mod summary_request;
pub mod summary_review;
pub mod types;

pub use document_render::DocumentRenderTask;
pub use load_record::LoadRecordTask;
pub use summary_request::SummaryRequestTask;
pub use summary_review::SummaryReviewTask;
pub use types::{RecordSource, session_keys};
