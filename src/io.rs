use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use rfd::FileDialog;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Extensions offered by the open dialog.
pub const OPEN_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tga", "gif", "tiff", "tif"];

/// Raster formats the tool can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub const ALL: [SaveFormat; 5] = [
        SaveFormat::Png,
        SaveFormat::Jpeg,
        SaveFormat::Webp,
        SaveFormat::Bmp,
        SaveFormat::Tga,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Webp => "webp",
            SaveFormat::Bmp => "bmp",
            SaveFormat::Tga => "tga",
        }
    }

    pub fn label(&self) -> String {
        match self {
            SaveFormat::Png => t!("format.png"),
            SaveFormat::Jpeg => t!("format.jpeg"),
            SaveFormat::Webp => t!("format.webp"),
            SaveFormat::Bmp => t!("format.bmp"),
            SaveFormat::Tga => t!("format.tga"),
        }
    }

    /// Parse a format name or file extension. Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            "tga" => Some(SaveFormat::Tga),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_name)
    }
}

/// Load any image the `image` crate can decode as 8-bit RGBA.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, String> {
    let img = image::open(path).map_err(|e| e.to_string())?;
    let rgba = img.to_rgba8();
    if rgba.width() == 0 || rgba.height() == 0 {
        return Err(format!("{} has no pixels", path.display()));
    }
    Ok(rgba)
}

/// Encode and write an image to a file.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Webp => {
            DynamicImage::ImageRgba8(image.clone())
                .write_to(&mut writer, image::ImageOutputFormat::WebP)?;
        }
    }

    Ok(())
}

// ============================================================================
// FILE HANDLER
// ============================================================================

pub struct FileHandler {
    /// Current file path (None until an image is opened or saved)
    pub current_path: Option<PathBuf>,
    /// Last used save format
    pub last_format: SaveFormat,
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandler {
    pub fn new() -> Self {
        Self {
            current_path: None,
            last_format: SaveFormat::Png,
        }
    }

    /// Show the native open dialog and load the chosen image.
    /// `Ok(None)` means the user dismissed the dialog.
    pub fn open_image(&mut self) -> Result<Option<(RgbaImage, PathBuf)>, String> {
        let Some(path) = FileDialog::new()
            .add_filter("Images", OPEN_EXTENSIONS)
            .add_filter("All Files", &["*"])
            .pick_file()
        else {
            return Ok(None);
        };

        let rgba = load_image_sync(&path)?;
        self.current_path = Some(path.clone());
        if let Some(format) = SaveFormat::from_path(&path) {
            self.last_format = format;
        }
        Ok(Some((rgba, path)))
    }

    /// Show the native save dialog. Returns the chosen path and format.
    pub fn pick_save_path(&self) -> Option<(PathBuf, SaveFormat)> {
        let mut dialog = FileDialog::new();
        // Offer the last used format first
        let mut formats = vec![self.last_format];
        formats.extend(SaveFormat::ALL.iter().copied().filter(|f| *f != self.last_format));
        for f in formats {
            dialog = dialog.add_filter(&f.label(), &[f.extension()]);
        }
        if let Some(stem) = self
            .current_path
            .as_ref()
            .and_then(|p| p.file_stem())
            .and_then(|s| s.to_str())
        {
            dialog = dialog.set_file_name(&format!("{}.{}", stem, self.last_format.extension()));
        }
        let path = dialog.save_file()?;
        let format = SaveFormat::from_path(&path).unwrap_or(self.last_format);
        Some((path, format))
    }

    /// Save to `path` and remember it as the current file.
    pub fn save_image(
        &mut self,
        image: &RgbaImage,
        path: &Path,
        format: SaveFormat,
        quality: u8,
    ) -> Result<(), ImageError> {
        encode_and_write(image, path, format, quality)?;
        self.current_path = Some(path.to_path_buf());
        self.last_format = format;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn format_names_and_extensions() {
        assert_eq!(SaveFormat::from_name("JPEG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_name("jpg"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::from_name("gif"), None);
        assert_eq!(SaveFormat::from_path(Path::new("a/b.TGA")), Some(SaveFormat::Tga));
        assert_eq!(SaveFormat::from_path(Path::new("noext")), None);
        for f in SaveFormat::ALL {
            assert_eq!(SaveFormat::from_name(f.extension()), Some(f));
        }
    }

    #[test]
    fn png_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        let img = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 200, 7, 255]));
        let mut handler = FileHandler::new();
        handler.save_image(&img, &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(handler.current_path.as_deref(), Some(path.as_path()));
        assert_eq!(load_image_sync(&path).unwrap(), img);
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_image_sync(&dir.path().join("nope.png")).is_err());
    }
}
