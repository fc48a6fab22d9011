//! Editable image: the uploaded origin plus the working buffer every tool mutates

use image::RgbaImage;

#[derive(Debug, Clone)]
pub struct EditableImage {
    origin: RgbaImage,
    current: RgbaImage,
}

impl EditableImage {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            current: image.clone(),
            origin: image,
        }
    }

    pub fn origin(&self) -> &RgbaImage {
        &self.origin
    }

    pub fn current(&self) -> &RgbaImage {
        &self.current
    }

    pub fn width(&self) -> u32 {
        self.current.width()
    }

    pub fn height(&self) -> u32 {
        self.current.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.current.dimensions()
    }

    /// Replace the working buffer wholesale
    pub fn replace(&mut self, image: RgbaImage) {
        self.current = image;
    }

    /// Discard all edits
    pub fn reset(&mut self) {
        self.current = self.origin.clone();
    }

    pub fn is_modified(&self) -> bool {
        self.current != self.origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_replace_and_reset() {
        let mut img = EditableImage::new(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        assert!(!img.is_modified());

        img.replace(RgbaImage::from_pixel(2, 3, Rgba([9, 9, 9, 255])));
        assert_eq!(img.dimensions(), (2, 3));
        assert!(img.is_modified());

        img.reset();
        assert_eq!(img.dimensions(), (4, 4));
        assert!(!img.is_modified());
    }
}
