use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use plotters::prelude::*;

use crate::error::AppError;

use super::analyze::ChangeBucket;

pub const CHART_WIDTH: u32 = 1200;
pub const CHART_HEIGHT: u32 = 600;

const BAR: RGBColor = RGBColor(0x36, 0x60, 0x92);

fn chart_err(e: impl std::fmt::Display) -> AppError {
    AppError::Render(format!("change histogram: {e}"))
}

/// Zero-width buckets are widened to one percentage point so a single-valued
/// distribution still shows up.
fn bar_span(bucket: &ChangeBucket) -> (f64, f64) {
    if bucket.upper - bucket.lower > f64::EPSILON {
        (bucket.lower, bucket.upper)
    } else {
        (bucket.lower - 0.5, bucket.upper + 0.5)
    }
}

/// Draws the 24h change distribution as a histogram and returns PNG bytes.
#[tracing::instrument(
    name = "pipeline_stage chart",
    skip(buckets),
    fields(pipeline.stage = "chart", buckets = buckets.len(), bytes)
)]
pub fn change_histogram(buckets: &[ChangeBucket]) -> Result<Vec<u8>, AppError> {
    let mut pixels = vec![0u8; (CHART_WIDTH * CHART_HEIGHT * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (CHART_WIDTH, CHART_HEIGHT))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let (lower, upper) = buckets
            .iter()
            .map(bar_span)
            .fold(None, |acc: Option<(f64, f64)>, (l, u)| match acc {
                Some((lo, hi)) => Some((lo.min(l), hi.max(u))),
                None => Some((l, u)),
            })
            .unwrap_or((-1.0, 1.0));
        let max_count = buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1) as f64;

        let mut chart = ChartBuilder::on(&root)
            .margin(40)
            .build_cartesian_2d(lower..upper, 0f64..max_count * 1.1)
            .map_err(chart_err)?;

        chart
            .draw_series(buckets.iter().map(|b| {
                let (l, u) = bar_span(b);
                Rectangle::new([(l, 0.0), (u, b.count as f64)], BAR.filled())
            }))
            .map_err(chart_err)?;

        chart
            .draw_series(buckets.iter().filter(|b| b.count > 0).map(|b| {
                let (l, u) = bar_span(b);
                Rectangle::new([(l, 0.0), (u, b.count as f64)], WHITE.stroke_width(2))
            }))
            .map_err(chart_err)?;

        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![(lower, 0.0), (upper, 0.0)],
                BLACK.stroke_width(2),
            )))
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
    }

    let frame = RgbImage::from_raw(CHART_WIDTH, CHART_HEIGHT, pixels)
        .ok_or_else(|| AppError::Render("change histogram: pixel buffer size mismatch".into()))?;

    let mut png = Cursor::new(Vec::new());
    frame
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| AppError::Render(format!("change histogram encode: {e}")))?;

    let bytes = png.into_inner();
    tracing::Span::current().record("bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn bucket(lower: f64, upper: f64, count: usize) -> ChangeBucket {
        ChangeBucket {
            lower,
            upper,
            count,
        }
    }

    #[test]
    fn test_histogram_is_png_of_chart_size() {
        let buckets = vec![bucket(-2.0, 0.0, 3), bucket(0.0, 2.0, 1), bucket(2.0, 4.0, 5)];
        let png = change_histogram(&buckets).unwrap();

        assert!(png.starts_with(PNG_MAGIC));
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), CHART_WIDTH);
        assert_eq!(decoded.height(), CHART_HEIGHT);
    }

    #[test]
    fn test_histogram_draws_bars() {
        let png = change_histogram(&[bucket(-1.0, 1.0, 4)]).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();

        let bar = image::Rgb([0x36, 0x60, 0x92]);
        assert!(decoded.pixels().any(|p| *p == bar));
    }

    #[test]
    fn test_single_valued_and_empty_distributions_render() {
        assert!(change_histogram(&[bucket(1.5, 1.5, 7)]).unwrap().starts_with(PNG_MAGIC));
        assert!(change_histogram(&[]).unwrap().starts_with(PNG_MAGIC));
    }
}
