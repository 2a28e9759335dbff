//! PDF text extraction and page rasterisation via pdfium.
//!
//! pdfium is a C++ library behind FFI and not async-safe, so every call here
//! runs inside `tokio::task::spawn_blocking`.
//!
//! Rendering scales each page by `dpi / 72` and then caps both dimensions at
//! `max_rendered_pixels`, so a poster-sized page cannot exhaust memory.

use crate::error::ConvertError;
use crate::format::Format;
use crate::tools::Tool;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind the pdfium shared library.
///
/// `library` may name the library file itself or the directory holding it.
/// Without it the system library search path is used.
pub fn bind(library: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(path.join(Pdfium::pdfium_platform_library_name()))?
        }
        Some(path) => Pdfium::bind_to_library(path)?,
        None => Pdfium::bind_to_system_library()?,
    };
    Ok(Pdfium::new(bindings))
}

fn bind_for(from: Format, to: Format, library: Option<&Path>) -> Result<Pdfium, ConvertError> {
    bind(library).map_err(|e| {
        debug!("pdfium bind failed: {:?}", e);
        ConvertError::CapabilityUnavailable {
            from,
            to,
            missing: vec![Tool::Pdfium],
        }
    })
}

fn load<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ConvertError::malformed(path, Format::Pdf, format!("{:?}", e)))
}

/// Text of every page, in page order.
pub async fn extract_pages(
    path: &Path,
    to: Format,
    library: Option<&Path>,
) -> Result<Vec<String>, ConvertError> {
    let path = path.to_path_buf();
    let library = library.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_for(Format::Pdf, to, library.as_deref())?;
        let document = load(&pdfium, &path)?;
        let mut pages = Vec::new();
        for (i, page) in document.pages().iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| {
                    ConvertError::malformed(&path, Format::Pdf, format!("page {}: {:?}", i + 1, e))
                })?
                .all();
            pages.push(text);
        }
        info!("Extracted text from {} page(s)", pages.len());
        Ok(pages)
    })
    .await
    .map_err(|e| ConvertError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Settings for [`rasterize`].
#[derive(Debug, Clone)]
pub struct RasterSettings {
    pub format: Format,
    pub dpi: u32,
    pub max_pixels: u32,
    pub jpeg_quality: u8,
    pub library: Option<PathBuf>,
}

/// File name of page `index` (0-based) out of `total`, zero-padded so that
/// lexical order matches page order.
pub fn page_file_name(stem: &str, index: usize, total: usize, format: Format) -> String {
    let width = total.max(1).to_string().len();
    format!("{stem}-{:0width$}.{}", index + 1, format.extension())
}

/// Render every page of `path` into `out_dir`, one image per page.
pub async fn rasterize(
    path: &Path,
    out_dir: &Path,
    stem: &str,
    settings: RasterSettings,
) -> Result<Vec<PathBuf>, ConvertError> {
    let path = path.to_path_buf();
    let out_dir = out_dir.to_path_buf();
    let stem = stem.to_string();

    tokio::task::spawn_blocking(move || rasterize_blocking(&path, &out_dir, &stem, &settings))
        .await
        .map_err(|e| ConvertError::Internal(format!("Render task panicked: {}", e)))?
}

fn rasterize_blocking(
    path: &Path,
    out_dir: &Path,
    stem: &str,
    settings: &RasterSettings,
) -> Result<Vec<PathBuf>, ConvertError> {
    let pdfium = bind_for(Format::Pdf, settings.format, settings.library.as_deref())?;
    let document = load(&pdfium, path)?;
    let pages = document.pages();
    let total = pages.len() as usize;
    info!("PDF loaded: {} pages", total);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.dpi as f32 / 72.0)
        .set_maximum_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);

    let mut members = Vec::with_capacity(total);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ConvertError::malformed(path, Format::Pdf, format!("page {}: {:?}", idx + 1, e))
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        let target = out_dir.join(page_file_name(stem, idx, total, settings.format));
        write_image(&image, &target, settings.format, settings.jpeg_quality)?;
        members.push(target);
    }
    Ok(members)
}

fn write_image(
    image: &DynamicImage,
    target: &Path,
    format: Format,
    quality: u8,
) -> Result<(), ConvertError> {
    let encode_err = |e: image::ImageError| ConvertError::write(target, std::io::Error::other(e));
    match format {
        Format::Jpeg => {
            let file =
                std::fs::File::create(target).map_err(|e| ConvertError::write(target, e))?;
            let mut writer = BufWriter::new(file);
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality);
            encoder.encode_image(&image.to_rgb8()).map_err(encode_err)
        }
        _ => image
            .save_with_format(target, image::ImageFormat::Png)
            .map_err(encode_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_names_are_padded_to_page_count() {
        assert_eq!(page_file_name("deck", 0, 3, Format::Png), "deck-1.png");
        assert_eq!(page_file_name("deck", 0, 12, Format::Jpeg), "deck-01.jpg");
        assert_eq!(page_file_name("deck", 11, 12, Format::Jpeg), "deck-12.jpg");
        assert_eq!(page_file_name("a", 4, 100, Format::Png), "a-005.png");
    }

    #[test]
    fn images_are_written_in_requested_format() {
        let dir = tempfile::tempdir().unwrap();
        let img = DynamicImage::new_rgb8(4, 3);

        let png = dir.path().join("p.png");
        write_image(&img, &png, Format::Png, 90).unwrap();
        assert_eq!(&std::fs::read(&png).unwrap()[..4], b"\x89PNG");

        let jpg = dir.path().join("p.jpg");
        write_image(&img, &jpg, Format::Jpeg, 80).unwrap();
        assert_eq!(&std::fs::read(&jpg).unwrap()[..2], b"\xFF\xD8");
    }
}
