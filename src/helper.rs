use crate::config::RenderConfig;
use crate::error::Result;
use crate::matrix::ModuleMatrix;
use crate::raster::rasterize;
use crate::render::QrRenderer;
use crate::svg::to_svg_string;

use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/*---- Utilities ----*/

/// Prints a module matrix to the console, with a four module quiet zone.
pub fn print_matrix(matrix: &ModuleMatrix) {
    print!("{}", matrix_to_text(matrix));
}

fn matrix_to_text(matrix: &ModuleMatrix) -> String {
    let border = 4;
    let n = matrix.size() as i64;
    let mut out = String::new();
    for y in -border..n + border {
        for x in -border..n + border {
            let dark = x >= 0 && y >= 0 && matrix.get(x as usize, y as usize);
            let c = if dark { '█' } else { ' ' };
            out.push(c);
            out.push(c);
        }
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Saves an image as PNG.
///
/// # Arguments
///
/// * `image` - The image to save.
/// * `directory_path` - Optional. The directory the image is saved in. Defaults to "generated"; created if missing.
/// * `filename` - Optional. The file name without extension. Defaults to a timestamp.
///
/// # Returns
///
/// The path of the written file.
pub fn save_image(image: &RgbaImage, directory_path: Option<&str>, filename: Option<&str>) -> Result<PathBuf> {
    let directory_path = directory_path.unwrap_or("generated");
    let filename = match filename {
        Some(name) => name.trim_end_matches(".png").to_string(),
        None => {
            let since_the_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
            since_the_epoch.as_millis().to_string()
        }
    };

    if !Path::new(directory_path).exists() {
        fs::create_dir_all(directory_path)?;
    }

    let file_path = Path::new(directory_path).join(format!("{}.png", filename));
    image.save(&file_path)?;
    Ok(file_path)
}

/// Renders a configuration into an SVG document.
///
/// # Example
///
/// ```
/// use qrstyle::config::RenderConfig;
/// use qrstyle::helper::generate_svg_string;
///
/// let svg = generate_svg_string(&RenderConfig::new("Hello, World!")).unwrap();
/// assert!(svg.contains("<svg"));
/// ```
pub fn generate_svg_string(config: &RenderConfig) -> Result<String> {
    let scene = QrRenderer::new().render(config)?;
    to_svg_string(&scene)
}

/// Renders a configuration into an in-memory RGBA image.
///
/// The image is `size`×`size` pixels, or `size + 50` on each side with the background card.
///
/// # Example
///
/// ```
/// use qrstyle::config::RenderConfig;
/// use qrstyle::helper::generate_image_buffer;
///
/// let img = generate_image_buffer(&RenderConfig::new("Hello, World!")).unwrap();
/// assert_eq!(img.dimensions(), (200, 200));
/// ```
pub fn generate_image_buffer(config: &RenderConfig) -> Result<RgbaImage> {
    let scene = QrRenderer::new().render(config)?;
    rasterize(&scene)
}

/// Renders a configuration and saves it as PNG.
///
/// # Arguments
///
/// * `config` - What to render.
/// * `directory` - Optional. Defaults to "generated".
/// * `filename` - Optional. Defaults to a timestamp.
///
/// # Example
///
/// ```no_run
/// use qrstyle::config::{RenderConfig, Variant};
/// use qrstyle::helper::generate_image;
///
/// let path = generate_image(&RenderConfig::variant(Variant::Dot), Some("images"), Some("dot")).unwrap();
/// println!("saved {}", path.display());
/// ```
pub fn generate_image(config: &RenderConfig, directory: Option<&str>, filename: Option<&str>) -> Result<PathBuf> {
    let img = generate_image_buffer(config)?;
    save_image(&img, directory, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;

    #[test]
    fn test_generate_image_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let dir_path = dir.path().join("nested");
        let config = RenderConfig::new("save me").with_size(84.0);
        let path = generate_image(&config, dir_path.to_str(), Some("qr.png")).unwrap();
        assert_eq!(path, dir_path.join("qr.png"));
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (84, 84));
    }

    #[test]
    fn test_timestamp_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_image(&RgbaImage::new(2, 2), dir.path().to_str(), None).unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));
        assert!(path.exists());
    }

    #[test]
    fn test_card_grows_image() {
        let img = generate_image_buffer(&RenderConfig::variant(Variant::Basic)).unwrap();
        assert_eq!(img.dimensions(), (300, 300));
    }

    #[test]
    fn test_matrix_text() {
        let m = ModuleMatrix::from_rows(&[vec![true]]).unwrap();
        let text = matrix_to_text(&m);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 9 + 1);
        assert_eq!(lines[4].chars().filter(|&c| c == '█').count(), 2);
    }
}
