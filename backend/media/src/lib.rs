//! Upload intake and media helpers for StudySnap.

pub mod encode;
pub mod intake;
pub mod mime_detect;

pub use encode::{encode_base64, preview_uri, strip_data_uri};
pub use intake::{AcceptedImage, IntakeMode, UploadIntake, UploadedFile};
pub use mime_detect::{detect_mime_type, is_image, normalize_mime};
