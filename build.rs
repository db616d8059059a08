//! Build script for sniptex.
//!
//! Only the desktop shell needs Tauri's generated context; the pipeline
//! core builds without it.

fn main() {
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
