//! HTTP clients for the external collaborator APIs: transcription,
//! highlight finding, and media upload.

pub mod error;
pub mod highlight;
pub mod transcription;
pub mod upload;

pub use error::{ClientError, ClientResult};
pub use highlight::HighlightClient;
pub use transcription::{TranscriptionClient, TranscriptionResponse, MAX_AUDIO_BYTES};
pub use upload::UploadClient;
