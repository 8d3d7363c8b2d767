use crate::error::{PipelineError, Result};
use crate::structs::{HourlySeries, RainStation, WindObservation};
use log::debug;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};

/// INMET reports where the wind blows from; the rose is drawn 90° ahead.
pub const DIRECTION_CORRECTION: f64 = 90.0;

/// Sector labels, counter-clockwise from the top of the rose.
pub const OCTANT_LABELS: [&str; 8] = ["N", "NW", "W", "SW", "S", "SE", "E", "NE"];

pub const SPEED_CLASSES: usize = 6;

pub const WINDROSE_FILE: &str = "windrose.png";

const BAR_SIZE: (u32, u32) = (2000, 1500);
const ROSE_SIZE: (u32, u32) = (1600, 1900);
/// Fraction of each 45° sector covered by its bar
const OPENING: f64 = 0.8;

const CLASS_COLORS: [RGBColor; SPEED_CLASSES] = [
    RGBColor(0, 0, 200),
    RGBColor(0, 128, 255),
    RGBColor(0, 220, 220),
    RGBColor(160, 230, 60),
    RGBColor(255, 170, 0),
    RGBColor(220, 20, 20),
];

/// Rotates a direction and wraps it into `[0, 360)`.
pub fn rotate_direction(direction: f64, degrees: f64) -> f64 {
    (direction + degrees).rem_euclid(360.0)
}

/// Octant (index into `OCTANT_LABELS`) whose 45° sector contains `angle`.
pub fn octant_index(angle: f64) -> usize {
    ((angle.rem_euclid(360.0) + 22.5) / 45.0).floor() as usize % OCTANT_LABELS.len()
}

/// Wind observations binned by direction sector and speed class
#[derive(Debug, Clone, PartialEq)]
pub struct WindRose {
    /// Lower bound of each speed class; the last class is open-ended.
    pub class_floors: [f64; SPEED_CLASSES],
    /// Percentage of all observations per (octant, speed class)
    pub frequencies: [[f64; SPEED_CLASSES]; 8],
}

impl WindRose {
    /// Sum of a sector's stacked bars.
    pub fn sector_total(&self, octant: usize) -> f64 {
        self.frequencies[octant].iter().sum()
    }

    pub fn class_label(&self, class: usize) -> String {
        match self.class_floors.get(class + 1) {
            Some(ceiling) => format!("[{:.1} : {:.1})", self.class_floors[class], ceiling),
            None => format!(">= {:.1}", self.class_floors[class]),
        }
    }
}

/// Bins observations into the 8 rotated direction sectors and 6 equal-width
/// speed classes spanning the observed speeds.
///
/// # Errors
/// Returns `PipelineError::EmptyAggregationSet` when there is nothing to bin.
pub fn windrose_bins(observations: &[WindObservation]) -> Result<WindRose> {
    if observations.is_empty() {
        return Err(PipelineError::EmptyAggregationSet("wind rose".to_string()));
    }
    let min = observations.iter().map(|o| o.speed).fold(f64::INFINITY, f64::min);
    let max = observations
        .iter()
        .map(|o| o.speed)
        .fold(f64::NEG_INFINITY, f64::max);
    let step = (max - min) / (SPEED_CLASSES - 1) as f64;
    let class_floors: [f64; SPEED_CLASSES] = std::array::from_fn(|i| min + step * i as f64);

    let share = 100.0 / observations.len() as f64;
    let mut frequencies = [[0.0; SPEED_CLASSES]; 8];
    for observation in observations {
        let octant = octant_index(rotate_direction(observation.direction, DIRECTION_CORRECTION));
        let class = class_floors
            .iter()
            .rposition(|floor| observation.speed >= *floor)
            .unwrap_or(0);
        frequencies[octant][class] += share;
    }

    Ok(WindRose {
        class_floors,
        frequencies,
    })
}

/// Path of a station's hourly chart: name and code with anything that is not
/// alphanumeric removed.
pub fn precipitation_chart_path(station: &RainStation, scratch: &Path) -> PathBuf {
    let keep = |s: &str| s.chars().filter(|c| c.is_alphanumeric()).collect::<String>();
    scratch.join(format!("{}_{}.png", keep(&station.name), keep(&station.code)))
}

/// Draws the hourly accumulated rain of one station as a bar chart.
pub fn plot_precipitation(
    series: &HourlySeries,
    station: &RainStation,
    scratch: &Path,
) -> Result<PathBuf> {
    let path = precipitation_chart_path(station, scratch);
    debug!("Plotting {} hourly buckets to {}", series.len(), path.display());

    let labels: Vec<String> = series
        .buckets
        .iter()
        .map(|(t, _)| t.format("%H:%M").to_string())
        .collect();
    let peak = series.buckets.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let y_max = if peak > 0.0 { peak * 1.1 } else { 1.0 };
    let buckets = series.len().max(1);

    {
        let root = BitMapBackend::new(&path, BAR_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        let (header, body) = root.split_vertically(180);

        let centre = BAR_SIZE.0 as i32 / 2;
        let title = centered_text(56);
        header
            .draw_text(&format!("Estação {}", station.name), &title, (centre, 60))
            .map_err(chart_error)?;
        header
            .draw_text(
                &format!(
                    "Latitude: {:.5}, Longitude: {:.5}",
                    station.latitude, station.longitude
                ),
                &title,
                (centre, 130),
            )
            .map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&body)
            .margin(30)
            .x_label_area_size(100)
            .y_label_area_size(130)
            .build_cartesian_2d((0..buckets).into_segmented(), 0f64..y_max)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(buckets.min(24))
            .x_label_formatter(&|x| match x {
                SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                    labels.get(*i).cloned().unwrap_or_default()
                }
                SegmentValue::Last => String::new(),
            })
            .x_desc("Hora (UTC)")
            .y_desc("Pluviosidade (mm)")
            .label_style(("sans-serif", 30))
            .axis_desc_style(("sans-serif", 38))
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(BLUE.filled())
                    .margin(8)
                    .data(series.buckets.iter().enumerate().map(|(i, (_, v))| (i, *v))),
            )
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }

    Ok(path)
}

/// Draws the wind rose of the filtered INMET observations.
pub fn plot_windrose(observations: &[WindObservation], scratch: &Path) -> Result<PathBuf> {
    let rose = windrose_bins(observations)?;
    let path = scratch.join(WINDROSE_FILE);
    debug!(
        "Plotting wind rose of {} observations to {}",
        observations.len(),
        path.display()
    );

    {
        let root = BitMapBackend::new(&path, ROSE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;
        let (plot, legend) = root.split_vertically(ROSE_SIZE.0 as i32);
        draw_rose(&plot, &rose)?;
        draw_legend(&legend, &rose)?;
        root.present().map_err(chart_error)?;
    }

    Ok(path)
}

fn draw_rose<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, rose: &WindRose) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let centre = (width as f64 / 2.0, height as f64 / 2.0);
    let radius = width.min(height) as f64 * 0.38;
    let peak = (0..OCTANT_LABELS.len())
        .map(|octant| rose.sector_total(octant))
        .fold(0.0, f64::max)
        .max(f64::EPSILON);
    let scale = radius / peak;
    let half_opening = 45.0 * OPENING / 2.0;

    // Reference rings with their frequency labels
    let grid = ShapeStyle::from(&BLACK.mix(0.3)).stroke_width(2);
    let small = centered_text(28);
    for ring in 1..=4 {
        let r = radius * ring as f64 / 4.0;
        let outline: Vec<(i32, i32)> = (0..=120)
            .map(|step| polar(centre, r, step as f64 * 3.0))
            .collect();
        area.draw(&PathElement::new(outline, grid))
            .map_err(chart_error)?;
        area.draw_text(
            &format!("{:.1}%", peak * ring as f64 / 4.0),
            &small,
            polar(centre, r, 22.5),
        )
        .map_err(chart_error)?;
    }

    let edge = ShapeStyle::from(&WHITE).stroke_width(2);
    for (octant, classes) in rose.frequencies.iter().enumerate() {
        let heading = octant as f64 * 45.0;
        let mut inner = 0.0;
        for (class, frequency) in classes.iter().enumerate() {
            if *frequency <= 0.0 {
                continue;
            }
            let outer = inner + frequency * scale;
            let wedge = wedge_points(centre, inner, outer, heading - half_opening, heading + half_opening);
            area.draw(&Polygon::new(wedge.clone(), CLASS_COLORS[class].filled()))
                .map_err(chart_error)?;
            let mut outline = wedge;
            if let Some(first) = outline.first().copied() {
                outline.push(first);
            }
            area.draw(&PathElement::new(outline, edge))
                .map_err(chart_error)?;
            inner = outer;
        }
    }

    let label = centered_text(44);
    for (octant, name) in OCTANT_LABELS.iter().enumerate() {
        area.draw_text(name, &label, polar(centre, radius * 1.15, octant as f64 * 45.0))
            .map_err(chart_error)?;
    }
    Ok(())
}

fn draw_legend<DB: DrawingBackend>(area: &DrawingArea<DB, Shift>, rose: &WindRose) -> Result<()> {
    let (width, _) = area.dim_in_pixel();
    area.draw_text(
        "Wind speed (m/s)",
        &centered_text(40),
        (width as i32 / 2, 60),
    )
    .map_err(chart_error)?;

    let column = width as i32 / SPEED_CLASSES as i32;
    let text = TextStyle::from(("sans-serif", 28).into_font()).pos(Pos::new(HPos::Left, VPos::Center));
    for class in 0..SPEED_CLASSES {
        let x = column * class as i32 + 20;
        area.draw(&Rectangle::new(
            [(x, 130), (x + 40, 170)],
            CLASS_COLORS[class].filled(),
        ))
        .map_err(chart_error)?;
        area.draw_text(&rose.class_label(class), &text, (x + 50, 150))
            .map_err(chart_error)?;
    }
    Ok(())
}

/// Pixel position of a polar point, `angle` in degrees counter-clockwise from the top.
fn polar(centre: (f64, f64), r: f64, angle: f64) -> (i32, i32) {
    let theta = angle * PI / 180.0;
    (
        (centre.0 - r * theta.sin()).round() as i32,
        (centre.1 - r * theta.cos()).round() as i32,
    )
}

fn wedge_points(centre: (f64, f64), inner: f64, outer: f64, from: f64, to: f64) -> Vec<(i32, i32)> {
    const STEPS: usize = 12;
    let angle = |step: usize| from + (to - from) * step as f64 / STEPS as f64;
    let mut points: Vec<(i32, i32)> = (0..=STEPS).map(|s| polar(centre, outer, angle(s))).collect();
    points.extend((0..=STEPS).rev().map(|s| polar(centre, inner, angle(s))));
    points
}

fn centered_text(size: u32) -> TextStyle<'static> {
    TextStyle::from(("sans-serif", size).into_font()).pos(Pos::new(HPos::Center, VPos::Center))
}

fn chart_error<E: std::fmt::Display>(error: E) -> PipelineError {
    PipelineError::Chart(error.to_string())
}
