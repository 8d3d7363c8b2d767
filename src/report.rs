use crate::error::Result;
use crate::load::{read_sample, round};
use crate::structs::{RainStation, RainSummary, TimeWindow, WindStation, WindStats};
use log::debug;
use std::path::PathBuf;

/// A4 width in mm
pub const PAGE_WIDTH: f32 = 210.0;

const PERIOD_FORMAT: &str = "%Y-%m-%d %H:%M";
const ROW_HEIGHT: f32 = 6.0;

/// One element of a page, laid out top to bottom
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Line of text centered across the page
    Text {
        text: String,
        size: f32,
        bold: bool,
        height: f32,
    },
    Spacer(f32),
    Table(Table),
    Image { path: PathBuf, x: f32, width: f32 },
}

impl Block {
    fn text(text: impl Into<String>, size: f32, bold: bool, height: f32) -> Self {
        Block::Text {
            text: text.into(),
            size,
            bold,
            height,
        }
    }

    /// Text of a line block, for callers that look up sections.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Block::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub width: f32,
}

/// Bordered table; header and footer rows are bold
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Left edge (mm)
    pub x: f32,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub footer: Option<Vec<String>>,
    pub font_size: f32,
    pub row_height: f32,
}

impl Table {
    fn new(x: f32, columns: &[(&str, f32)], font_size: f32) -> Self {
        Self {
            x,
            columns: columns
                .iter()
                .map(|(header, width)| Column {
                    header: header.to_string(),
                    width: *width,
                })
                .collect(),
            rows: Vec::new(),
            footer: None,
            font_size,
            row_height: ROW_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub blocks: Vec<Block>,
}

/// Ordered pages of the report. Content that overflows a page continues on
/// the next one when rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub pages: Vec<Page>,
}

impl Document {
    fn new_page(&mut self) -> &mut Page {
        self.pages.push(Page::default());
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }
}

/// Everything the report shows about the CEMADEN network
pub struct CemadenSection<'a> {
    pub stations: &'a [RainStation],
    pub summary: Option<&'a RainSummary>,
    pub sample: Option<PathBuf>,
    pub charts: &'a [PathBuf],
}

/// Everything the report shows about the INMET station
pub struct InmetSection<'a> {
    pub station: &'a WindStation,
    pub stats: Option<WindStats>,
    pub sample: Option<PathBuf>,
    pub charts: &'a [PathBuf],
}

/// Lays out the report: CEMADEN section first, then INMET. Each section starts
/// on a page of its own.
///
/// Missing optional parts (statistics, samples, charts) are left out.
///
/// # Errors
/// Returns error if a sample side file cannot be read.
pub fn compose(
    window: &TimeWindow,
    cemaden: Option<&CemadenSection>,
    inmet: Option<&InmetSection>,
) -> Result<Document> {
    let mut document = Document::default();
    let period = format!(
        "Período: {} até {} UTC",
        window.start().format(PERIOD_FORMAT),
        window.end().format(PERIOD_FORMAT)
    );

    if let Some(section) = cemaden {
        compose_cemaden(&mut document, &period, section)?;
    }
    if let Some(section) = inmet {
        compose_inmet(&mut document, &period, section)?;
    }

    debug!(
        "Composed report: {} pages, {} blocks",
        document.pages.len(),
        document.blocks().count()
    );
    Ok(document)
}

fn compose_cemaden(document: &mut Document, period: &str, section: &CemadenSection) -> Result<()> {
    let page = document.new_page();
    page.blocks.extend([
        Block::text("Dados de estações pluviométricas do CEMADEN", 16.0, true, 10.0),
        Block::text(period, 16.0, true, 10.0),
        Block::Spacer(10.0),
        Block::text("Estações utilizadas", 10.0, true, 10.0),
    ]);
    let mut stations = Table::new(20.0, &[("Estação", 75.0), ("Local", 45.0), ("Lat/Lon", 50.0)], 10.0);
    stations.rows = section
        .stations
        .iter()
        .map(|s| {
            vec![
                s.name.clone(),
                format!("{}-{}", s.municipality, s.state),
                // CEMADEN exports the two coordinates under each other's header.
                format!("{}/{}", round(s.longitude, 6), round(s.latitude, 6)),
            ]
        })
        .collect();
    page.blocks.push(Block::Table(stations));

    if let Some(summary) = section.summary {
        page.blocks.push(Block::Spacer(10.0));
        page.blocks.push(Block::text("Chuva acumulada por estação", 10.0, true, 10.0));
        let mut totals = Table::new(42.0, &[("Estação", 75.0), ("Chuva acumulada (mm)", 51.0)], 10.0);
        totals.rows = summary
            .totals
            .iter()
            .map(|(name, total)| vec![name.clone(), format!("{:.1}", total)])
            .collect();
        totals.footer = Some(vec!["Média".to_string(), format!("{:.1}", summary.mean)]);
        page.blocks.push(Block::Table(totals));
    }

    if let Some(path) = &section.sample {
        let sample = read_sample(path)?;
        page.blocks.push(Block::Spacer(10.0));
        page.blocks.push(Block::text("Amostra não processada dos dados do CEMADEN", 10.0, true, 10.0));
        let widths = [20.0, 25.0, 15.0, 35.0, 20.0, 20.0, 30.0, 25.0];
        let columns: Vec<(&str, f32)> = sample
            .headers
            .iter()
            .map(String::as_str)
            .zip(widths)
            .collect();
        let mut table = Table::new(10.0, &columns, 8.0);
        table.rows = sample.rows;
        page.blocks.push(Block::Table(table));
    }

    if !section.charts.is_empty() {
        let page = document.new_page();
        page.blocks.push(Block::text("Chuva (mm) acumulada por hora por estação", 12.0, true, 10.0));
        page.blocks.push(Block::Spacer(10.0));
        page.blocks.extend(section.charts.iter().map(|path| Block::Image {
            path: path.clone(),
            x: 30.0,
            width: 150.0,
        }));
    }
    Ok(())
}

fn compose_inmet(document: &mut Document, period: &str, section: &InmetSection) -> Result<()> {
    let si = section.station;
    let page = document.new_page();
    page.blocks.extend([
        Block::text("Dados da estação do INMET", 16.0, true, 10.0),
        Block::text(period, 16.0, true, 10.0),
        Block::Spacer(10.0),
        Block::text("Dados da estação e das medidas de vento coletadas", 10.0, true, 10.0),
    ]);

    let mut columns: Vec<(&str, f32)> = vec![("Estação", 30.0), ("Lat/Lon", 35.0), ("Altitude (m)", 30.0)];
    let mut row = vec![
        format!("{}, {}-{}", si.code, si.name, si.state),
        format!("{}/{}", si.raw_latitude, si.raw_longitude),
        si.raw_altitude.clone(),
    ];
    if let Some(stats) = section.stats {
        columns.extend([("Rajada máxima (m/s)", 40.0), ("Velocidade média (m/s)", 45.0)]);
        row.extend([stats.max_gust.to_string(), format!("{:.2}", stats.mean_speed)]);
    }
    let mut table = Table::new(15.0, &columns, 8.0);
    table.rows.push(row);
    page.blocks.push(Block::Table(table));

    if let Some(path) = &section.sample {
        let sample = read_sample(path)?;
        page.blocks.extend([
            Block::Spacer(10.0),
            Block::text("Amostra não processada dos dados do INMET", 10.0, true, 5.0),
            Block::text("Apenas os dados de vento foram selecionados", 10.0, true, 5.0),
        ]);
        let mut table = Table::new(
            5.0,
            &[
                ("Data", 30.0),
                ("Hora (HHMM, UTC)", 40.0),
                ("Direção média (º)", 40.0),
                ("Rajada máxima (m/s)", 45.0),
                ("Velocidade média (m/s)", 45.0),
            ],
            8.0,
        );
        table.rows = sample.rows;
        page.blocks.push(Block::Table(table));
    }

    if !section.charts.is_empty() {
        let page = document.new_page();
        page.blocks.push(Block::text("Rosa dos ventos", 12.0, true, 10.0));
        page.blocks.push(Block::Spacer(10.0));
        page.blocks.extend(section.charts.iter().map(|path| Block::Image {
            path: path.clone(),
            x: 20.0,
            width: 170.0,
        }));
    }
    Ok(())
}
