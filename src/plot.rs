// Semi-log PNG charts of a run: per-strain populations and decomposition

use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

use crate::error::ModelError;
use crate::report::file_stem;
use crate::simulation::EnvironmentRun;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;
const MARGIN: u32 = 40;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([40, 40, 40, 255]);
const GRID: Rgba<u8> = Rgba([225, 225, 225, 255]);

// Line colors, cycled when there are more strains than entries
const PALETTE: [Rgba<u8>; 8] = [
    Rgba([31, 119, 180, 255]),
    Rgba([255, 127, 14, 255]),
    Rgba([44, 160, 44, 255]),
    Rgba([214, 39, 40, 255]),
    Rgba([148, 103, 189, 255]),
    Rgba([140, 86, 75, 255]),
    Rgba([227, 119, 194, 255]),
    Rgba([127, 127, 127, 255]),
];

/// Maps (t, value) onto pixels with a log10 value axis
struct SemiLogFrame {
    t_max: f64,
    log_min: f64,
    log_max: f64,
}

impl SemiLogFrame {
    /// Frame covering every positive value in `series`; None if there are none
    fn fit(t_max: f64, series: &[Vec<f64>]) -> Option<Self> {
        let positive = series
            .iter()
            .flatten()
            .copied()
            .filter(|v| *v > 0.0 && v.is_finite());
        let (min, max) = positive.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
        if !min.is_finite() {
            return None;
        }
        let mut log_min = min.log10().floor();
        let mut log_max = max.log10().ceil();
        if log_max <= log_min {
            log_min -= 1.0;
            log_max += 1.0;
        }
        Some(Self {
            t_max: if t_max > 0.0 { t_max } else { 1.0 },
            log_min,
            log_max,
        })
    }

    fn x(&self, t: f64) -> f64 {
        MARGIN as f64 + t / self.t_max * (WIDTH - 2 * MARGIN) as f64
    }

    fn y(&self, value: f64) -> f64 {
        let frac = (value.log10() - self.log_min) / (self.log_max - self.log_min);
        (HEIGHT - MARGIN) as f64 - frac * (HEIGHT - 2 * MARGIN) as f64
    }
}

fn put(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

// Bresenham line
fn draw_line(img: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let (mut x0, mut y0) = (from.0.round() as i64, from.1.round() as i64);
    let (x1, y1) = (to.0.round() as i64, to.1.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_axes(img: &mut RgbaImage, frame: Option<&SemiLogFrame>) {
    let left = MARGIN as f64;
    let right = (WIDTH - MARGIN) as f64;
    let top = MARGIN as f64;
    let bottom = (HEIGHT - MARGIN) as f64;

    // One grid line per decade
    if let Some(frame) = frame {
        let mut decade = frame.log_min;
        while decade <= frame.log_max {
            let y = frame.y(10f64.powf(decade));
            draw_line(img, (left, y), (right, y), GRID);
            decade += 1.0;
        }
    }

    draw_line(img, (left, top), (left, bottom), AXIS);
    draw_line(img, (left, bottom), (right, bottom), AXIS);
}

// Consecutive positive points are joined; non-positive values break the line
fn draw_series(
    img: &mut RgbaImage,
    frame: &SemiLogFrame,
    times: &[f64],
    values: &[f64],
    color: Rgba<u8>,
) {
    let mut prev: Option<(f64, f64)> = None;
    for (&t, &v) in times.iter().zip(values) {
        if v > 0.0 && v.is_finite() {
            let point = (frame.x(t), frame.y(v));
            if let Some(p) = prev {
                draw_line(img, p, point, color);
            } else {
                put(img, point.0.round() as i64, point.1.round() as i64, color);
            }
            prev = Some(point);
        } else {
            prev = None;
        }
    }
}

fn render(times: &[f64], series: &[Vec<f64>], path: &Path) -> Result<(), ModelError> {
    let mut img = RgbaImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let t_max = times.last().copied().unwrap_or(1.0);
    let frame = SemiLogFrame::fit(t_max, series);

    draw_axes(&mut img, frame.as_ref());
    if let Some(frame) = &frame {
        for (j, values) in series.iter().enumerate() {
            draw_series(&mut img, frame, times, values, PALETTE[j % PALETTE.len()]);
        }
    }

    img.save(path).map_err(|e| ModelError::output(path, e))
}

/// One line per strain population
pub fn render_populations(run: &EnvironmentRun, path: &Path) -> Result<(), ModelError> {
    let series: Vec<Vec<f64>> = (0..run.strain_labels.len())
        .map(|j| run.trajectory.series(j))
        .collect();
    render(&run.trajectory.times, &series, path)
}

/// Combined decomposer population
pub fn render_decomposition(run: &EnvironmentRun, path: &Path) -> Result<(), ModelError> {
    render(
        &run.trajectory.times,
        std::slice::from_ref(&run.decomposition),
        path,
    )
}

/// Both charts for `run` into `dir`; returns the paths written
pub fn render_run(run: &EnvironmentRun, dir: &Path) -> Result<Vec<PathBuf>, ModelError> {
    let stem = file_stem(&run.environment);
    let populations = dir.join(format!("{}_populations.png", stem));
    let decomposition = dir.join(format!("{}_decomposition.png", stem));
    render_populations(run, &populations)?;
    render_decomposition(run, &decomposition)?;
    Ok(vec![populations, decomposition])
}
