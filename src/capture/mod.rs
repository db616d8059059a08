//! Screen capture domain, public API.
//!
//! This module owns everything between "the user released the mouse at
//! this virtual-screen rectangle" and "here is a PNG on disk".
//! External code should only use the items re-exported here.

pub mod display;
mod engine;
mod region;
pub mod resolver;
#[cfg(feature = "desktop")]
mod screenshot;
pub mod source;

pub use display::{layout_displays, Display, DisplayEnumerator, PlatformMonitor};
pub use engine::{CaptureDiagnostics, CaptureEngine, CaptureResult, DisplayDiagnostics};
pub use region::{crop_to_png_bytes, project_selection, source_crop_rect, CropError, Projection};
pub use resolver::{Resolution, ResolveContext, ResolveStrategy, SourceResolver};
#[cfg(feature = "desktop")]
pub use screenshot::{TauriDisplays, XcapSources};
pub use source::{CaptureSource, SourceEnumerator, SourceInfo};

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate displays: {0}")]
    DisplayEnumeration(String),

    #[error("Failed to enumerate capture sources: {0}")]
    SourceEnumeration(String),

    #[error("No displays attached")]
    NoDisplays,

    #[error("No screen sources available")]
    NoCaptureSourcesAvailable,

    #[error("No capture source matches display {display_id}")]
    NoMatchingSource { display_id: String },

    #[error("Cropped image is empty")]
    EmptyCapture,

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("Failed to write capture file: {0}")]
    Io(#[from] std::io::Error),
}
