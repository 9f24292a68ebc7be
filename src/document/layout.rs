//! Per-character boxes for PDF pages.
//!
//! [`LayoutOutput`] is a `pdf-extract` output device that writes the same
//! text as the crate's plain text output and records a box for every char it
//! writes. Coordinates use a top-left origin in PDF points, y growing down.
//! Spaces and newlines inserted between glyphs have no box.

use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Rectangle on a page, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Page size and one optional box per char of the page text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub width: f64,
    pub height: f64,
    pub boxes: Vec<Option<BoundingBox>>,
}

impl PageLayout {
    /// Union of the boxes of chars `start..end`, if any has one
    pub fn bbox(&self, start: usize, end: usize) -> Option<BoundingBox> {
        let end = end.min(self.boxes.len());
        let start = start.min(end);
        self.boxes[start..end]
            .iter()
            .flatten()
            .fold(None, |acc: Option<BoundingBox>, b| Some(acc.map_or(*b, |a| a.union(b))))
    }
}

/// Output device collecting text and char boxes for one page
pub struct LayoutOutput {
    text: String,
    layout: PageLayout,
    last_end: f64,
    last_y: f64,
    first_char: bool,
}

impl Default for LayoutOutput {
    fn default() -> Self {
        Self {
            text: String::new(),
            layout: PageLayout::default(),
            last_end: 100000.,
            last_y: 0.,
            first_char: false,
        }
    }
}

impl LayoutOutput {
    pub fn finish(self) -> (String, PageLayout) {
        (self.text, self.layout)
    }

    fn push_unboxed(&mut self, c: char) {
        self.text.push(c);
        self.layout.boxes.push(None);
    }
}

impl OutputDev for LayoutOutput {
    fn begin_page(
        &mut self,
        _page_num: u32,
        media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.layout.width = media_box.urx - media_box.llx;
        self.layout.height = media_box.ury - media_box.lly;
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        glyph: &str,
    ) -> Result<(), OutputError> {
        // Page flip applied by hand: x stays, y is measured from the top
        let x = trm.m31;
        let y = self.layout.height - trm.m32;
        let scaled_x = font_size * (trm.m11 + trm.m21);
        let scaled_y = font_size * (trm.m12 + trm.m22);
        let size = (scaled_x * scaled_y).sqrt();

        if self.first_char {
            if (y - self.last_y).abs() > size * 1.5 {
                self.push_unboxed('\n');
            }
            if x < self.last_end && (y - self.last_y).abs() > size * 0.5 {
                self.push_unboxed('\n');
            }
            if x > self.last_end + size * 0.1 {
                self.push_unboxed(' ');
            }
        }

        let advance = x + width * size;
        let glyph_box = BoundingBox {
            x0: x.min(advance),
            y0: y - size,
            x1: x.max(advance),
            y1: y,
        };
        for c in glyph.chars() {
            self.text.push(c);
            self.layout.boxes.push(Some(glyph_box));
        }

        self.first_char = false;
        self.last_y = y;
        self.last_end = advance;
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        self.first_char = true;
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Text and layout of every page, in page order
///
/// Extraction stops at the first page that cannot be read, keeping the
/// pages before it.
pub fn extract_pages(doc: &pdf_extract::Document) -> Vec<(String, PageLayout)> {
    let mut pages = Vec::new();

    for page_num in doc.get_pages().into_keys() {
        let mut output = LayoutOutput::default();
        if let Err(e) = pdf_extract::output_doc_page(doc, &mut output, page_num) {
            warn!(page = page_num, error = %e, "Stopping extraction at unreadable page");
            break;
        }
        pages.push(output.finish());
    }

    pages
}
