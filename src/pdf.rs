use crate::error::{PipelineError, Result};
use crate::report::{Block, Document, PAGE_WIDTH, Table};
use log::debug;
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// A4 height in mm
pub const PAGE_HEIGHT: f32 = 297.0;

const TOP_MARGIN: f32 = 3.0;
const BOTTOM_MARGIN: f32 = 12.0;
const PT_TO_MM: f32 = 0.3528;
const LAYER: &str = "Layer 1";

/// Renders `document` as an A4 PDF at `output_path` and returns the number
/// of PDF pages written.
///
/// Each page of the document starts a new PDF page; blocks that do not fit
/// continue on an extra page, tables repeating their header row. Images are
/// scaled to the block width, keeping their aspect ratio.
///
/// # Errors
/// Returns `PipelineError::Pdf` if a chart cannot be embedded or the file cannot be written.
pub fn write_pdf(document: &Document, title: &str, output_path: &Path) -> Result<usize> {
    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut writer = PageWriter {
        doc: &doc,
        layer,
        regular,
        bold,
        y: TOP_MARGIN,
        pages: 1,
    };

    for (index, page) in document.pages.iter().enumerate() {
        if index > 0 {
            writer.new_page();
        }
        for block in &page.blocks {
            writer.block(block)?;
        }
    }
    let pages = writer.pages;

    let file = File::create(output_path)?;
    doc.save(&mut BufWriter::new(file)).map_err(pdf_error)?;
    debug!("Wrote {} PDF pages to {}", pages, output_path.display());
    Ok(pages)
}

/// Drawing state: current layer and the distance from the top of the page (mm)
struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl PageWriter<'_> {
    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = TOP_MARGIN;
        self.pages += 1;
    }

    /// Breaks the page unless `height` still fits below the cursor.
    fn reserve(&mut self, height: f32) -> bool {
        let fits = self.y + height <= PAGE_HEIGHT - BOTTOM_MARGIN;
        if !fits && self.y > TOP_MARGIN {
            self.new_page();
            return true;
        }
        false
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        match block {
            Block::Text {
                text,
                size,
                bold,
                height,
            } => {
                self.reserve(*height);
                self.text(text, *size, *bold, 0.0, PAGE_WIDTH, *height);
                self.y += height;
            }
            Block::Spacer(height) => {
                if !self.reserve(*height) {
                    self.y += height;
                }
            }
            Block::Table(table) => self.table(table),
            Block::Image { path, x, width } => self.image(path, *x, *width)?,
        }
        Ok(())
    }

    fn table(&mut self, table: &Table) {
        let headers: Vec<&str> = table.columns.iter().map(|c| c.header.as_str()).collect();
        self.reserve(table.row_height * 2.0);
        self.row(table, &headers, true);
        for row in &table.rows {
            if self.reserve(table.row_height) {
                self.row(table, &headers, true);
            }
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            self.row(table, &cells, false);
        }
        if let Some(footer) = &table.footer {
            self.reserve(table.row_height);
            let cells: Vec<&str> = footer.iter().map(String::as_str).collect();
            self.row(table, &cells, true);
        }
    }

    fn row(&mut self, table: &Table, cells: &[&str], bold: bool) {
        let size = if bold { table.font_size.max(10.0) } else { table.font_size };
        let mut x = table.x;
        for (column, cell) in table.columns.iter().zip(cells.iter().chain(std::iter::repeat(&""))) {
            self.rect(x, column.width, table.row_height);
            self.text(cell, size, bold, x, column.width, table.row_height);
            x += column.width;
        }
        self.y += table.row_height;
    }

    fn image(&mut self, path: &Path, x: f32, width: f32) -> Result<()> {
        let picture = image::open(path).map_err(|e| {
            PipelineError::Pdf(format!("cannot read chart {}: {}", path.display(), e))
        })?;
        let (px_width, px_height) = (picture.width() as f32, picture.height() as f32);
        let height = width * px_height / px_width;
        self.reserve(height);

        let transform = ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(PAGE_HEIGHT - self.y - height)),
            dpi: Some(px_width * 25.4 / width),
            ..Default::default()
        };
        Image::from_dynamic_image(&picture).add_to_layer(self.layer.clone(), transform);
        self.y += height;
        Ok(())
    }

    /// Text centered in the box `[x, x + width]` of the current line.
    fn text(&self, text: &str, size: f32, bold: bool, x: f32, width: f32, height: f32) {
        if text.is_empty() {
            return;
        }
        let font = if bold { &self.bold } else { &self.regular };
        let left = x + ((width - text_width(text, size, bold)) / 2.0).max(0.5);
        let baseline = self.y + height / 2.0 + size * PT_TO_MM * 0.35;
        self.layer
            .use_text(text, size, Mm(left), Mm(PAGE_HEIGHT - baseline), font);
    }

    fn rect(&self, x: f32, width: f32, height: f32) {
        let top = PAGE_HEIGHT - self.y;
        let bottom = top - height;
        let corners = [(x, top), (x + width, top), (x + width, bottom), (x, bottom)];
        self.layer.set_outline_thickness(0.3);
        self.layer.add_line(Line {
            points: corners
                .iter()
                .map(|(cx, cy)| (Point::new(Mm(*cx), Mm(*cy)), false))
                .collect(),
            is_closed: true,
        });
    }
}

/// Approximate Helvetica advance width (mm); builtin fonts carry no metrics here.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let em = if bold { 0.56 } else { 0.52 };
    text.chars().count() as f32 * size * em * PT_TO_MM
}

fn pdf_error<E: std::fmt::Display>(error: E) -> PipelineError {
    PipelineError::Pdf(error.to_string())
}
