use std::path::Path;

use crate::error::RenderError;
use crate::shading::{to_b, to_g, to_r, to_rgb};

/// Row-major texels packed as `0x00RRGGBB`, the same format as the output image.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    data: Vec<u32>,
}

impl Texture {
    /// Panics if `data` does not hold exactly `width * height` texels.
    pub fn new(width: u32, height: u32, data: Vec<u32>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize,
            "texture data does not match its {width}x{height} size"
        );
        assert!(width > 0 && height > 0, "texture must not be empty");
        Self {
            width,
            height,
            data,
        }
    }

    pub fn solid(rgb: u32) -> Self {
        Self::new(1, 1, vec![rgb & 0x00FF_FFFF])
    }

    pub fn checkerboard(width: u32, height: u32, cells: u32, a: u32, b: u32) -> Self {
        let cell_w = (width / cells.max(1)).max(1);
        let cell_h = (height / cells.max(1)).max(1);
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| if (x / cell_w + y / cell_h) % 2 == 0 { a } else { b })
            .collect();
        Self::new(width, height, data)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let texture = Self::from_image(&image::open(path)?.into_rgb8())?;
        log::info!(
            "Loaded texture {} ({}x{})",
            path.display(),
            texture.width,
            texture.height
        );
        Ok(texture)
    }

    pub fn from_image(image: &image::RgbImage) -> Result<Self, RenderError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(RenderError::EmptyTexture { width, height });
        }
        let data = image
            .pixels()
            .map(|p| to_rgb(p[0] as i32, p[1] as i32, p[2] as i32))
            .collect();
        Ok(Self::new(width, height, data))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    /// Texel at `(x, y)`, clamped into the texture.
    pub fn texel(&self, x: i32, y: i32) -> u32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    pub fn texel_rgb(&self, x: i32, y: i32) -> [f32; 3] {
        let rgb = self.texel(x, y);
        [to_r(rgb) as f32, to_g(rgb) as f32, to_b(rgb) as f32]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_texels_are_clamped() {
        let texture = Texture::new(2, 2, vec![0x000001, 0x000002, 0x000003, 0x000004]);
        assert_eq!(texture.texel(0, 0), 0x000001);
        assert_eq!(texture.texel(1, 1), 0x000004);
        assert_eq!(texture.texel(2, 0), 0x000002);
        assert_eq!(texture.texel(-3, 5), 0x000003);
        assert_eq!(texture.texel(7, 7), 0x000004);
    }

    #[test]
    fn checkerboard_alternates() {
        let texture = Texture::checkerboard(4, 4, 2, 0xFFFFFF, 0x000000);
        assert_eq!(texture.texel(0, 0), 0xFFFFFF);
        assert_eq!(texture.texel(2, 0), 0x000000);
        assert_eq!(texture.texel(0, 2), 0x000000);
        assert_eq!(texture.texel(3, 3), 0xFFFFFF);
    }

    #[test]
    fn texel_rgb_splits_channels() {
        let texture = Texture::solid(0x12_34_56);
        assert_eq!(texture.texel_rgb(0, 0), [18.0, 52.0, 86.0]);
    }

    #[test]
    fn empty_image_is_an_error() {
        let empty = image::RgbImage::new(0, 4);
        assert!(matches!(
            Texture::from_image(&empty),
            Err(RenderError::EmptyTexture { width: 0, height: 4 })
        ));
    }

    #[test]
    fn image_pixels_are_packed() {
        let image = image::RgbImage::from_raw(2, 1, vec![0x12, 0x34, 0x56, 0xFF, 0x00, 0x01]).unwrap();
        let texture = Texture::from_image(&image).unwrap();
        assert_eq!(texture.data(), &[0x123456, 0xFF0001]);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            Texture::open("does/not/exist.png"),
            Err(RenderError::Texture(_))
        ));
    }

    #[test]
    #[should_panic]
    fn mismatched_data_panics() {
        let _ = Texture::new(2, 2, vec![0; 3]);
    }
}
