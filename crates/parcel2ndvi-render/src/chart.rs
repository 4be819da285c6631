//! Chart drawing
//!
//! Marked series line with optional error bars, a fixed-degree trend line
//! (plain charts) or the crop-mean curve with a ±1 stdev band (overlay
//! charts), y locked to [0, 1], month-boundary gridlines, and in-plot
//! `YYYY / MON` labels spanning the visible range.

use std::path::Path;

use chrono::{Datelike, Days, NaiveDate};
use parcel2ndvi_core::fit;
use plotters::prelude::*;
use tracing::debug;

use crate::backend::FontSafeBackend;
use crate::error::RenderError;
use crate::ChartJob;

const GRID_GREY: RGBColor = RGBColor(210, 210, 210);
const BAR_GREY: RGBColor = RGBColor(128, 128, 128);

pub(crate) fn draw(
    path: &Path,
    job: &ChartJob<'_>,
    numeric: &[(NaiveDate, f64, f64)],
    first: NaiveDate,
    last: NaiveDate,
    error_bars: bool,
    size: (u32, u32),
) -> Result<(), RenderError> {
    let root = FontSafeBackend::new(BitMapBackend::new(path, size)).into_drawing_area();
    root.fill(&WHITE).map_err(to_backend)?;

    // snap the x range to whole months, inclusive of partial boundary months
    let mut lo = first;
    let mut hi = last;
    if let Some(mean) = job.group_mean {
        for point in mean {
            lo = lo.min(point.acq_date);
            hi = hi.max(point.acq_date);
        }
    }
    let x_min = month_start(lo);
    let x_max = month_end(hi);

    let caption = format!("{}, Id: {}, {}", job.title, job.parcel_id, job.crop);
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, ("sans-serif", 26))
        .margin(16)
        .x_label_area_size(56)
        .y_label_area_size(52)
        .build_cartesian_2d(x_min..x_max, 0.0f64..1.0f64)
        .map_err(to_backend)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_labels(11)
        .y_desc("NDVI")
        .x_label_formatter(&|date: &NaiveDate| date.format("%Y-%m-%d").to_string())
        .draw()
        .map_err(to_backend)?;

    let months = month_starts(x_min, x_max);
    for month in &months {
        chart
            .draw_series(LineSeries::new([(*month, 0.0), (*month, 1.0)], &GRID_GREY))
            .map_err(to_backend)?;
    }
    let label_font = ("sans-serif", 15).into_font().color(&BLUE);
    for month in &months {
        let mid = *month + Days::new(14);
        chart
            .draw_series([
                Text::new(month.format("%Y").to_string(), (mid, 0.985), label_font.clone()),
                Text::new(
                    month.format("%b").to_string().to_uppercase(),
                    (mid, 0.955),
                    label_font.clone(),
                ),
            ])
            .map_err(to_backend)?;
    }

    // overlay charts flip the colors: the crop mean takes blue
    let series_color = if job.group_mean.is_some() { RED } else { BLUE };

    chart
        .draw_series(LineSeries::new(
            numeric.iter().map(|(date, mean, _)| (*date, *mean)),
            &series_color,
        ))
        .map_err(to_backend)?
        .label("parcel NDVI")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], series_color));
    chart
        .draw_series(
            numeric
                .iter()
                .map(|(date, mean, _)| Cross::new((*date, *mean), 4, series_color.filled())),
        )
        .map_err(to_backend)?;

    if error_bars {
        chart
            .draw_series(numeric.iter().map(|(date, mean, std)| {
                ErrorBar::new_vertical(
                    *date,
                    (mean - std).max(0.0),
                    *mean,
                    (mean + std).min(1.0),
                    BAR_GREY.filled(),
                    6,
                )
            }))
            .map_err(to_backend)?;
    }

    match job.group_mean {
        Some(mean) if !mean.is_empty() => {
            let mut band: Vec<(NaiveDate, f64)> = mean
                .iter()
                .map(|p| (p.acq_date, (p.ndvi_mean + p.ndvi_stdev).min(1.0)))
                .collect();
            band.extend(
                mean.iter()
                    .rev()
                    .map(|p| (p.acq_date, (p.ndvi_mean - p.ndvi_stdev).max(0.0))),
            );
            chart
                .draw_series(std::iter::once(Polygon::new(band, BLUE.mix(0.2))))
                .map_err(to_backend)?;
            chart
                .draw_series(LineSeries::new(
                    mean.iter().map(|p| (p.acq_date, p.ndvi_mean)),
                    &BLUE,
                ))
                .map_err(to_backend)?
                .label("crop mean NDVI")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], BLUE));
        }
        Some(_) => {}
        None => {
            // degree-5 trend needs more points than the degree
            if numeric.len() > fit::TREND_DEGREE {
                let dates: Vec<NaiveDate> = numeric.iter().map(|(date, ..)| *date).collect();
                let values: Vec<f64> = numeric.iter().map(|(_, mean, _)| *mean).collect();
                match fit::fit_series(&dates, &values) {
                    Ok(fitted) => {
                        chart
                            .draw_series(LineSeries::new(
                                dates.into_iter().zip(fitted),
                                &RED,
                            ))
                            .map_err(to_backend)?
                            .label("trend")
                            .legend(|(x, y)| {
                                PathElement::new(vec![(x, y), (x + 18, y)], RED)
                            });
                    }
                    Err(err) => {
                        debug!(parcel = job.parcel_id, error = %err, "trend line omitted");
                    }
                }
            }
        }
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(to_backend)?;

    root.present().map_err(to_backend)?;
    Ok(())
}

fn to_backend<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Backend(err.to_string())
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).expect("first of month is a valid date")
}

fn next_month(start: NaiveDate) -> NaiveDate {
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("first of month is a valid date")
}

fn month_end(date: NaiveDate) -> NaiveDate {
    next_month(month_start(date)) - Days::new(1)
}

fn month_starts(x_min: NaiveDate, x_max: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = month_start(x_min);
    while current <= x_max {
        months.push(current);
        current = next_month(current);
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn month_span_covers_partial_boundary_months() {
        assert_eq!(month_start(date("2021-03-17")), date("2021-03-01"));
        assert_eq!(month_end(date("2021-02-03")), date("2021-02-28"));
        assert_eq!(month_end(date("2021-12-05")), date("2021-12-31"));
    }

    #[test]
    fn month_starts_span_inclusive() {
        let months = month_starts(date("2021-03-01"), date("2021-06-30"));
        assert_eq!(
            months,
            vec![
                date("2021-03-01"),
                date("2021-04-01"),
                date("2021-05-01"),
                date("2021-06-01"),
            ]
        );
    }

    #[test]
    fn year_rollover() {
        let months = month_starts(date("2020-11-15"), date("2021-02-10"));
        assert_eq!(months.first(), Some(&date("2020-11-01")));
        assert_eq!(months.last(), Some(&date("2021-02-01")));
        assert_eq!(months.len(), 4);
    }
}
