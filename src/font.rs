// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Label font lookup and download.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use ab_glyph::FontVec;

use crate::logging::LogSink;

/// Assets URL for downloading fonts
const ASSETS_URL: &str = "https://github.com/ultralytics/assets/releases/download/v0.0.0";

/// Font used for score labels.
pub const DEFAULT_FONT: &str = "Arial.ttf";

/// Directory fonts are cached in.
#[must_use]
pub fn font_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("Ultralytics"))
}

/// Check if font exists locally or download it
pub fn check_font(font: &str, log: &dyn LogSink) -> Option<PathBuf> {
    let font_name = Path::new(font).file_name()?.to_string_lossy();
    let config_dir = font_dir()?;
    let font_path = config_dir.join(font_name.as_ref());

    if font_path.exists() {
        return Some(font_path);
    }

    if let Err(e) = fs::create_dir_all(&config_dir) {
        log.warn(&format!("Failed to create config directory: {e}"));
        return None;
    }

    let url = format!("{ASSETS_URL}/{font_name}");
    log.info(&format!("Downloading {url} to {}", font_path.display()));

    match ureq::get(&url).call() {
        Ok(response) => {
            let mut file = match File::create(&font_path) {
                Ok(f) => f,
                Err(e) => {
                    log.warn(&format!("Failed to create font file: {e}"));
                    return None;
                }
            };

            let mut reader = response.into_body().into_reader();
            if let Err(e) = io::copy(&mut reader, &mut file) {
                log.warn(&format!("Failed to download font: {e}"));
                // Try to remove partial file
                let _ = fs::remove_file(&font_path);
                return None;
            }

            Some(font_path)
        }
        Err(e) => {
            log.warn(&format!("Failed to download font from {url}: {e}"));
            None
        }
    }
}

/// Parse a font file.
pub fn read_font<P: AsRef<Path>>(path: P) -> Option<FontVec> {
    let data = fs::read(path).ok()?;
    FontVec::try_from_vec(data).ok()
}

/// Locate (downloading if needed) and parse a label font.
///
/// `None` means labels cannot be drawn; a warning has been logged.
pub fn load_font(font: &str, log: &dyn LogSink) -> Option<FontVec> {
    let loaded = check_font(font, log).and_then(read_font);
    if loaded.is_none() {
        log.warn(&format!("Font {font} unavailable, score labels will not be drawn"));
    }
    loaded
}
