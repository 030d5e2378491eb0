use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use reqwest::Client;

use crate::player::ProviderResult;

pub struct ArtworkRenderer {
    client: Client,
}

pub type DualPixelColor = (u8, u8, u8, u8, u8, u8);
pub type AsciiArtLine = (String, Vec<DualPixelColor>);

impl ArtworkRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn fetch_image(&self, url: &str) -> ProviderResult<DynamicImage> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let img = image::load_from_memory(&bytes)?;
        Ok(img)
    }

    /// Scale to a `size`×`size` square, cropping the longer side.
    pub fn fit(img: &DynamicImage, size: u32) -> DynamicImage {
        if img.dimensions() == (size, size) {
            return img.clone();
        }
        img.resize_to_fill(size, size, FilterType::Triangle)
    }

    /// Half-block rendering: each output row packs two pixel rows, top as
    /// foreground and bottom as background of a `▀`.
    pub fn render_to_lines(
        img: &DynamicImage,
        target_width: u32,
        target_height: u32,
    ) -> Vec<AsciiArtLine> {
        let actual_height = target_height * 2;
        if target_width == 0 || actual_height == 0 {
            return Vec::new();
        }
        let resized = img.resize_exact(target_width, actual_height, FilterType::Triangle);

        let mut lines: Vec<AsciiArtLine> = Vec::with_capacity(target_height as usize);

        for y in (0..actual_height).step_by(2) {
            let mut line_chars = String::new();
            let mut line_colors: Vec<DualPixelColor> = Vec::with_capacity(target_width as usize);

            for x in 0..target_width {
                let top_pixel = resized.get_pixel(x, y);
                let bottom_pixel = if y + 1 < actual_height {
                    resized.get_pixel(x, y + 1)
                } else {
                    top_pixel
                };

                let (tr, tg, tb) = (top_pixel[0], top_pixel[1], top_pixel[2]);
                let (br, bg, bb) = (bottom_pixel[0], bottom_pixel[1], bottom_pixel[2]);

                line_chars.push('▀');
                line_colors.push((tr, tg, tb, br, bg, bb));
            }

            lines.push((line_chars, line_colors));
        }

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[test]
    fn test_fit_makes_square() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(640, 480, Rgb([1, 2, 3])));
        let fitted = ArtworkRenderer::fit(&img, 300);
        assert_eq!(fitted.dimensions(), (300, 300));
    }

    #[test]
    fn test_render_to_lines_packs_two_rows() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([200, 10, 10])));
        let lines = ArtworkRenderer::render_to_lines(&img, 4, 2);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0.chars().count(), 4);
        assert_eq!(lines[0].1[0], (200, 10, 10, 200, 10, 10));
    }

    #[test]
    fn test_render_to_lines_empty_area() {
        let img = DynamicImage::new_rgb8(4, 4);
        assert!(ArtworkRenderer::render_to_lines(&img, 0, 3).is_empty());
    }
}
