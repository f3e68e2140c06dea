//! Page geometry: page box from the first slide, placement of every other.
//!
//! Slides are assumed to be 96 DPI rasters, so one pixel is `25.4 / 96` mm.
//! The first page of a segment fixes the page box for the whole document;
//! later pages are scaled to fit inside it (aspect ratio preserved) and
//! centred on both axes.

use serde::{Deserialize, Serialize};

/// Millimetres per pixel at 96 DPI.
pub const MM_PER_PX: f64 = 25.4 / 96.0;

/// PDF points per millimetre.
pub const PT_PER_MM: f64 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Fixed physical page size of one output document, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub width_mm: f64,
    pub height_mm: f64,
}

impl PageBox {
    pub fn from_pixels(width_px: u32, height_px: u32) -> Self {
        Self {
            width_mm: f64::from(width_px) * MM_PER_PX,
            height_mm: f64::from(height_px) * MM_PER_PX,
        }
    }

    pub fn orientation(&self) -> Orientation {
        if self.width_mm > self.height_mm {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// Width and height in PDF points, for the `MediaBox`.
    pub fn size_pt(&self) -> (f64, f64) {
        (self.width_mm * PT_PER_MM, self.height_mm * PT_PER_MM)
    }

    /// Where an image of the given raster size goes on this page.
    pub fn place(&self, width_px: u32, height_px: u32) -> Placement {
        place_image(*self, width_px, height_px)
    }
}

/// Image rectangle on the page, in millimetres from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

impl Placement {
    /// The full page box, used for the first page.
    pub fn fill(page: PageBox) -> Self {
        Self {
            x_mm: 0.0,
            y_mm: 0.0,
            width_mm: page.width_mm,
            height_mm: page.height_mm,
        }
    }

    /// PDF image matrix `[w 0 0 h x y]` in points, with PDF's bottom-left
    /// origin.
    pub fn to_pdf_matrix(&self, page: PageBox) -> [f64; 6] {
        let w = self.width_mm * PT_PER_MM;
        let h = self.height_mm * PT_PER_MM;
        let x = self.x_mm * PT_PER_MM;
        let y = (page.height_mm - self.y_mm - self.height_mm) * PT_PER_MM;
        [w, 0.0, 0.0, h, x, y]
    }
}

/// Fit an image into `page`, preserving its aspect ratio, and centre it.
///
/// The scale factor is `min(W / imgW, H / imgH)` with the image measured at
/// 96 DPI; the leftover margin is split evenly on each axis.
pub fn place_image(page: PageBox, width_px: u32, height_px: u32) -> Placement {
    if width_px == 0 || height_px == 0 {
        return Placement::fill(page);
    }
    let img_w = f64::from(width_px) * MM_PER_PX;
    let img_h = f64::from(height_px) * MM_PER_PX;
    let scale = (page.width_mm / img_w).min(page.height_mm / img_h);
    let width_mm = img_w * scale;
    let height_mm = img_h * scale;

    Placement {
        x_mm: (page.width_mm - width_mm) / 2.0,
        y_mm: (page.height_mm - height_mm) / 2.0,
        width_mm,
        height_mm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn page_box_uses_96_dpi() {
        let b = PageBox::from_pixels(960, 540);
        assert!(close(b.width_mm, 254.0));
        assert!(close(b.height_mm, 142.875));
        assert_eq!(b.orientation(), Orientation::Landscape);
        assert_eq!(PageBox::from_pixels(540, 960).orientation(), Orientation::Portrait);
        assert_eq!(PageBox::from_pixels(500, 500).orientation(), Orientation::Portrait);
    }

    #[test]
    fn same_size_image_fills_the_box() {
        let b = PageBox::from_pixels(1280, 720);
        let p = b.place(1280, 720);
        assert!(close(p.x_mm, 0.0) && close(p.y_mm, 0.0));
        assert!(close(p.width_mm, b.width_mm) && close(p.height_mm, b.height_mm));
    }

    #[test]
    fn wider_image_is_scaled_down_and_centred_vertically() {
        let b = PageBox::from_pixels(1000, 750);
        let p = b.place(2000, 1000);

        let img_w = 2000.0 * MM_PER_PX;
        let img_h = 1000.0 * MM_PER_PX;
        let scale = (b.width_mm / img_w).min(b.height_mm / img_h);
        assert!(close(scale, 0.5));
        assert!(close(p.width_mm, b.width_mm));
        assert!(close(p.height_mm, img_h * scale));
        assert!(close(p.x_mm, 0.0));
        assert!(close(p.y_mm, (b.height_mm - img_h * scale) / 2.0));
    }

    #[test]
    fn taller_image_is_centred_horizontally() {
        let b = PageBox::from_pixels(1600, 900);
        let p = b.place(900, 1800);

        assert!(close(p.height_mm, b.height_mm));
        assert!(p.width_mm < b.width_mm);
        assert!(close(p.x_mm, (b.width_mm - p.width_mm) / 2.0));
        assert!(close(p.y_mm, 0.0));
    }

    #[test]
    fn pdf_matrix_flips_to_bottom_left_origin() {
        let b = PageBox::from_pixels(960, 960);
        let p = Placement {
            x_mm: 10.0,
            y_mm: 20.0,
            width_mm: 100.0,
            height_mm: 50.0,
        };
        let m = p.to_pdf_matrix(b);
        assert!(close(m[0], 100.0 * PT_PER_MM));
        assert!(close(m[3], 50.0 * PT_PER_MM));
        assert!(close(m[4], 10.0 * PT_PER_MM));
        assert!(close(m[5], (254.0 - 20.0 - 50.0) * PT_PER_MM));
    }
}
