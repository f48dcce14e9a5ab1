//! Lossless vertical splitting of a page raster into display-sized bands

use image::RgbImage;
use image::imageops;

/// Tallest band a display surface accepts, in pixels
pub const MAX_CHUNK_HEIGHT: u32 = 3000;

/// Horizontal band of a raster: rows `y..y + height`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Band {
    pub y: u32,
    pub height: u32,
}

/// Partition `full_height` rows into contiguous bands of at most `max_height`,
/// top to bottom. Only the last band may be shorter.
#[must_use]
pub fn band_rows(full_height: u32, max_height: u32) -> Vec<Band> {
    let max_height = max_height.max(1);
    let mut bands = Vec::with_capacity(full_height.div_ceil(max_height) as usize);
    let mut y = 0;
    while y < full_height {
        let height = max_height.min(full_height - y);
        bands.push(Band { y, height });
        y += height;
    }
    bands
}

/// Cut `image` into full-width bands. No pixel is scaled, dropped or repeated.
#[must_use]
pub fn split_into_bands(image: &RgbImage, max_height: u32) -> Vec<(Band, RgbImage)> {
    let width = image.width();
    band_rows(image.height(), max_height)
        .into_iter()
        .map(|band| {
            let part = imageops::crop_imm(image, 0, band.y, width, band.height).to_image();
            (band, part)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn striped(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| Rgb([(y % 251) as u8, (y / 251 % 251) as u8, 7]))
    }

    #[test]
    fn tall_page_splits_into_full_and_remainder() {
        let bands = band_rows(4200, 3000);
        assert_eq!(
            bands,
            vec![
                Band { y: 0, height: 3000 },
                Band { y: 3000, height: 1200 }
            ]
        );
    }

    #[test]
    fn short_page_yields_single_band() {
        assert_eq!(band_rows(1650, MAX_CHUNK_HEIGHT), vec![Band { y: 0, height: 1650 }]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let bands = band_rows(6000, 3000);
        assert_eq!(bands.len(), 2);
        assert!(bands.iter().all(|b| b.height == 3000));
    }

    #[test]
    fn band_count_is_ceiling_and_heights_sum_to_total() {
        for height in [1, 2, 999, 1000, 1001, 2999, 3000, 3001, 7777, 12000] {
            for max in [1, 7, 1000, 3000] {
                let bands = band_rows(height, max);
                assert_eq!(bands.len() as u32, height.div_ceil(max), "h={height} max={max}");
                assert_eq!(bands.iter().map(|b| b.height).sum::<u32>(), height);
                assert!(bands.iter().all(|b| b.height <= max && b.height > 0));
                for pair in bands.windows(2) {
                    assert_eq!(pair[0].y + pair[0].height, pair[1].y);
                }
            }
        }
    }

    #[test]
    fn split_preserves_width_and_pixels() {
        let image = striped(13, 4200);
        let parts = split_into_bands(&image, 3000);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].1.height(), 1200);
        for (band, part) in &parts {
            assert_eq!(part.width(), image.width());
            assert_eq!(part.height(), band.height);
            for y in 0..band.height {
                for x in 0..part.width() {
                    assert_eq!(part.get_pixel(x, y), image.get_pixel(x, band.y + y));
                }
            }
        }
    }

    #[test]
    fn zero_max_height_is_treated_as_one_row() {
        assert_eq!(band_rows(3, 0).len(), 3);
    }
}
