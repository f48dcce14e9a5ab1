//! Page rasterization into session-scoped chunk files

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use log::{debug, warn};
use mupdf::{Colorspace, Document, Matrix};

use super::chunk::{MAX_CHUNK_HEIGHT, split_into_bands};

/// Resolution every page is rasterized at
pub const RENDER_DPI: f32 = 150.0;

const POINTS_PER_INCH: f32 = 72.0;

/// File name of the unsplit raster kept next to the chunks
pub const FULL_PAGE_FILE: &str = "full_page.png";

/// Errors from rendering a page
#[derive(Debug, thiserror::Error)]
pub enum RenderFault {
    #[error("page {} does not exist, the document has {page_count} pages", .page + 1)]
    InvalidPage { page: usize, page_count: usize },

    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    #[error("failed to write {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to prepare {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{detail}")]
    Generic { detail: String },
}

impl RenderFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Files produced for one rendered page
#[derive(Clone, Debug)]
pub struct RenderedPage {
    /// Unsplit raster, left on disk but not part of the chunk sequence
    pub full_page: PathBuf,
    /// Chunk files, top to bottom
    pub chunks: Vec<PathBuf>,
    pub width_px: u32,
    pub height_px: u32,
}

/// Render one page and return its chunk paths, top to bottom.
///
/// Always yields at least one chunk. On failure nothing written by this call
/// is left behind.
pub fn render(
    source_path: &Path,
    page_index: usize,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, RenderFault> {
    render_page(source_path, page_index, output_dir).map(|page| page.chunks)
}

/// Like [`render`] but also reports the full raster and its size.
pub fn render_page(
    source_path: &Path,
    page_index: usize,
    output_dir: &Path,
) -> Result<RenderedPage, RenderFault> {
    let raster = rasterize(source_path, page_index)?;
    if raster.height() == 0 || raster.width() == 0 {
        return Err(RenderFault::generic(format!(
            "page {} of {source_path:?} rendered to an empty image",
            page_index + 1
        )));
    }

    let mut output = OutputGuard::create(output_dir)?;

    let full_page = output_dir.join(FULL_PAGE_FILE);
    output.save(&raster, &full_page)?;

    let mut chunks = Vec::new();
    for (band, part) in split_into_bands(&raster, MAX_CHUNK_HEIGHT) {
        let path = output_dir.join(format!("chunk_{}.png", band.y));
        output.save(&part, &path)?;
        chunks.push(path);
    }

    output.commit();
    debug!(
        "Rendered page {} of {source_path:?}: {}x{} px in {} chunks",
        page_index + 1,
        raster.width(),
        raster.height(),
        chunks.len()
    );

    Ok(RenderedPage {
        full_page,
        chunks,
        width_px: raster.width(),
        height_px: raster.height(),
    })
}

/// Rasterize a page at [`RENDER_DPI`] into an RGB image.
pub fn rasterize(source_path: &Path, page_index: usize) -> Result<RgbImage, RenderFault> {
    let doc = Document::open(source_path.to_string_lossy().as_ref())?;
    let page_count = usize::try_from(doc.page_count()?).unwrap_or(0);
    if page_index >= page_count {
        return Err(RenderFault::InvalidPage {
            page: page_index,
            page_count,
        });
    }

    let page = doc.load_page(page_index as i32)?;
    let scale = RENDER_DPI / POINTS_PER_INCH;
    let pixmap = page.to_pixmap(
        &Matrix::new_scale(scale, scale),
        &Colorspace::device_rgb(),
        false,
        false,
    )?;

    rgb_from_samples(
        pixmap.samples(),
        pixmap.width(),
        pixmap.height(),
        pixmap.stride() as usize,
        pixmap.n() as usize,
    )
}

/// Copy the colour channels of a row-padded pixel buffer into an RGB image.
///
/// `channels` is bytes per pixel (3 for RGB, 4 with alpha); anything past the
/// first three is dropped.
fn rgb_from_samples(
    samples: &[u8],
    width: u32,
    height: u32,
    stride: usize,
    channels: usize,
) -> Result<RgbImage, RenderFault> {
    if channels < 3 {
        return Err(RenderFault::generic(format!(
            "Unsupported pixmap format: {channels} channels"
        )));
    }
    let row_bytes = width as usize * channels;
    if row_bytes > stride || samples.len() < stride.saturating_mul(height as usize) {
        return Err(RenderFault::generic("Pixmap buffer size mismatch"));
    }

    Ok(RgbImage::from_fn(width, height, |x, y| {
        let at = y as usize * stride + x as usize * channels;
        Rgb([samples[at], samples[at + 1], samples[at + 2]])
    }))
}

/// Tracks what a render wrote so a failed render can be rolled back.
struct OutputGuard {
    dir: PathBuf,
    created_dir: bool,
    written: Vec<PathBuf>,
    committed: bool,
}

impl OutputGuard {
    fn create(dir: &Path) -> Result<Self, RenderFault> {
        let created_dir = !dir.exists();
        fs::create_dir_all(dir).map_err(|source| RenderFault::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            created_dir,
            written: Vec::new(),
            committed: false,
        })
    }

    fn save(&mut self, image: &RgbImage, path: &Path) -> Result<(), RenderFault> {
        self.written.push(path.to_path_buf());
        image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| RenderFault::Image {
                path: path.to_path_buf(),
                source,
            })
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }

        for path in &self.written {
            if path.exists() {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove partial render output {path:?}: {e}");
                }
            }
        }
        if self.created_dir {
            if let Err(e) = fs::remove_dir(&self.dir) {
                warn!("Failed to remove render directory {:?}: {e}", self.dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{write_pdf, write_pdf_with_size};
    use tempfile::TempDir;

    fn dimensions(path: &Path) -> (u32, u32) {
        image::image_dimensions(path).unwrap()
    }

    #[test]
    fn letter_page_fits_in_one_chunk() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("letter.pdf");
        write_pdf(&pdf, &["hello"]);
        let out = tmp.path().join("session");

        let page = render_page(&pdf, 0, &out).unwrap();

        assert_eq!(page.chunks.len(), 1);
        assert!(page.height_px <= MAX_CHUNK_HEIGHT);
        assert_eq!(dimensions(&page.chunks[0]), (page.width_px, page.height_px));
        assert!(page.full_page.exists());
        assert!(!page.chunks.contains(&page.full_page));
    }

    #[test]
    fn tall_page_is_split_losslessly() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("tall.pdf");
        // 2016pt at 150 DPI is 4200px
        write_pdf_with_size(&pdf, &["receipt"], (612, 2016));
        let out = tmp.path().join("session");

        let page = render_page(&pdf, 0, &out).unwrap();
        let (full_w, full_h) = dimensions(&page.full_page);

        assert_eq!(page.chunks.len() as u32, full_h.div_ceil(MAX_CHUNK_HEIGHT));
        assert_eq!(page.chunks.len(), 2);
        let mut total = 0;
        for chunk in &page.chunks {
            let (w, h) = dimensions(chunk);
            assert_eq!(w, full_w);
            assert!(h <= MAX_CHUNK_HEIGHT);
            total += h;
        }
        assert_eq!(total, full_h);
        assert!(page.chunks[0].ends_with("chunk_0.png"));
        assert!(page.chunks[1].ends_with("chunk_3000.png"));
    }

    #[test]
    fn out_of_range_page_is_invalid_and_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("two.pdf");
        write_pdf(&pdf, &["one", "two"]);
        let out = tmp.path().join("session");

        let err = render(&pdf, 2, &out).unwrap_err();

        assert!(matches!(err, RenderFault::InvalidPage { page: 2, page_count: 2 }));
        assert_eq!(err.to_string(), "page 3 does not exist, the document has 2 pages");
        assert!(!out.exists());
    }

    #[test]
    fn corrupt_document_fails_without_output() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("junk.pdf");
        fs::write(&pdf, b"%PDF-garbage").unwrap();
        let out = tmp.path().join("session");

        assert!(render(&pdf, 0, &out).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn failed_write_rolls_back_created_directory() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("session");
        let raster = RgbImage::new(4, 4);
        {
            let mut guard = OutputGuard::create(&out).unwrap();
            guard.save(&raster, &out.join(FULL_PAGE_FILE)).unwrap();
            let missing_parent = out.join("missing").join("chunk_0.png");
            assert!(guard.save(&raster, &missing_parent).is_err());
        }
        assert!(!out.exists());
    }

    #[test]
    fn padded_rgba_samples_keep_colour_channels() {
        // 2x2 RGBA with two bytes of row padding
        let samples = [
            1, 2, 3, 255, 4, 5, 6, 255, 0, 0, //
            7, 8, 9, 255, 10, 11, 12, 255, 0, 0,
        ];

        let image = rgb_from_samples(&samples, 2, 2, 10, 4).unwrap();

        assert_eq!(image.get_pixel(0, 0), &Rgb([1, 2, 3]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([4, 5, 6]));
        assert_eq!(image.get_pixel(1, 1), &Rgb([10, 11, 12]));
    }

    #[test]
    fn short_sample_buffer_is_rejected() {
        let err = rgb_from_samples(&[0; 5], 2, 1, 6, 3).unwrap_err();
        assert!(matches!(err, RenderFault::Generic { .. }));

        let err = rgb_from_samples(&[0; 8], 2, 2, 4, 2).unwrap_err();
        assert!(matches!(err, RenderFault::Generic { .. }));
    }
}
