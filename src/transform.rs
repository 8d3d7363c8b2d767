use crate::error::{PipelineError, Result};
use crate::structs::{
    HourlySeries, RainObservation, RainSummary, TimeWindow, Timestamped, WindObservation,
    WindStats,
};
use log::debug;

/// Selects the observations inside `window`.
///
/// # Arguments
/// * `observations` - Readings of one station, in any order
/// * `window` - Half-open `[start, end)` range
///
/// # Returns
/// The readings with `start <= t < end`, in their original relative order.
pub fn filter_window<T: Timestamped + Clone>(observations: &[T], window: &TimeWindow) -> Vec<T> {
    observations
        .iter()
        .filter(|o| window.contains(o.timestamp()))
        .cloned()
        .collect()
}

/// Sums precipitation into one-hour buckets.
///
/// The window is split into `window.hours()` consecutive buckets labelled by
/// their midpoint (`start + i h + 30 min`). Buckets without readings stay at
/// zero, so a station with no data in the window still yields a full series.
/// Readings outside every whole bucket are ignored.
///
/// # Arguments
/// * `observations` - Readings of one station, normally already filtered
/// * `window` - Analysis window
pub fn hourly_precipitation(observations: &[RainObservation], window: &TimeWindow) -> HourlySeries {
    let hours = window.hours();
    let mut sums = vec![0.0_f64; hours];

    let mut ignored = 0usize;
    for observation in observations {
        match window.bucket_index(observation.timestamp) {
            Some(index) => sums[index] += observation.value,
            None => ignored += 1,
        }
    }
    if ignored > 0 {
        debug!("Ignored {} readings outside the hourly buckets", ignored);
    }

    HourlySeries {
        buckets: sums
            .into_iter()
            .enumerate()
            .map(|(i, amount)| (window.bucket_midpoint(i), amount))
            .collect(),
    }
}

/// Accumulated rain per station and the mean of those totals.
///
/// # Errors
/// Returns `PipelineError::EmptyAggregationSet` when there are no stations.
pub fn rain_summary<'a>(
    series: impl IntoIterator<Item = (&'a str, &'a HourlySeries)>,
) -> Result<RainSummary> {
    let totals: Vec<(String, f64)> = series
        .into_iter()
        .map(|(name, s)| (name.to_string(), s.total()))
        .collect();
    if totals.is_empty() {
        return Err(PipelineError::EmptyAggregationSet(
            "mean accumulated rain".to_string(),
        ));
    }
    let mean = totals.iter().map(|(_, total)| total).sum::<f64>() / totals.len() as f64;
    Ok(RainSummary { totals, mean })
}

/// Peak gust and mean wind speed.
///
/// Gust and speed are taken as reported; no consistency check between them.
///
/// # Errors
/// Returns `PipelineError::EmptyAggregationSet` when `observations` is empty.
pub fn wind_statistics(observations: &[WindObservation]) -> Result<WindStats> {
    if observations.is_empty() {
        return Err(PipelineError::EmptyAggregationSet(
            "wind statistics".to_string(),
        ));
    }
    let max_gust = observations
        .iter()
        .map(|o| o.gust)
        .fold(f64::NEG_INFINITY, f64::max);
    let mean_speed =
        observations.iter().map(|o| o.speed).sum::<f64>() / observations.len() as f64;
    Ok(WindStats {
        max_gust,
        mean_speed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M").unwrap()
    }

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::new(at(start), at(end)).unwrap()
    }

    fn rain(date: &str, value: f64) -> RainObservation {
        RainObservation {
            raw_timestamp: format!("{}:00.0", date),
            timestamp: at(date),
            value,
        }
    }

    fn wind(date: &str, direction: f64, gust: f64, speed: f64) -> WindObservation {
        WindObservation {
            raw_date: date[..10].replace('-', "/"),
            raw_time: date[11..].replace(':', ""),
            timestamp: at(date),
            direction,
            gust,
            speed,
        }
    }

    #[test]
    fn test_filter_keeps_order_and_bounds() {
        let readings = vec![
            rain("2020-12-04 23:10", 0.2),
            rain("2020-12-04 21:59", 9.0),
            rain("2020-12-04 22:00", 0.1),
            rain("2020-12-05 00:00", 9.0),
            rain("2020-12-04 22:45", 0.3),
        ];
        let w = window("2020-12-04 22:00", "2020-12-05 00:00");

        let filtered = filter_window(&readings, &w);
        let values: Vec<f64> = filtered.iter().map(|o| o.value).collect();
        assert_eq!(values, vec![0.2, 0.1, 0.3]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let readings = vec![
            rain("2020-12-04 21:30", 1.0),
            rain("2020-12-04 22:30", 2.0),
            rain("2020-12-04 23:30", 3.0),
            rain("2020-12-05 01:00", 4.0),
        ];
        let w = window("2020-12-04 22:00", "2020-12-05 00:00");

        let once = filter_window(&readings, &w);
        let twice = filter_window(&once, &w);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_hourly_buckets_cover_window() {
        let w = window("2020-12-04 20:00", "2020-12-05 02:00");
        let readings = vec![
            rain("2020-12-04 20:05", 0.2),
            rain("2020-12-04 20:55", 0.4),
            rain("2020-12-04 23:00", 1.0),
            rain("2020-12-05 01:59", 0.6),
        ];
        let filtered = filter_window(&readings, &w);
        let series = hourly_precipitation(&filtered, &w);

        assert_eq!(series.len(), 6);
        for (i, (label, _)) in series.buckets.iter().enumerate() {
            assert_eq!(*label, w.bucket_midpoint(i));
        }
        let amounts: Vec<f64> = series.buckets.iter().map(|(_, v)| *v).collect();
        assert!((amounts[0] - 0.6).abs() < 1e-9);
        assert_eq!(amounts[1], 0.0);
        assert_eq!(amounts[2], 0.0);
        assert!((amounts[3] - 1.0).abs() < 1e-9);
        assert_eq!(amounts[4], 0.0);
        assert!((amounts[5] - 0.6).abs() < 1e-9);

        let direct: f64 = filtered.iter().map(|o| o.value).sum();
        assert!((series.total() - direct).abs() < 1e-9);
    }

    #[test]
    fn test_two_station_scenario() {
        let w = window("2020-12-04 22:00", "2020-12-05 00:00");
        let station_a = vec![rain("2020-12-04 22:20", 0.40)];
        let station_b: Vec<RainObservation> = Vec::new();

        let a = hourly_precipitation(&filter_window(&station_a, &w), &w);
        let b = hourly_precipitation(&filter_window(&station_b, &w), &w);

        assert_eq!(
            a.buckets,
            vec![
                (at("2020-12-04 22:30"), 0.40),
                (at("2020-12-04 23:30"), 0.0)
            ]
        );
        assert!((a.total() - 0.40).abs() < 1e-9);
        assert_eq!(
            b.buckets,
            vec![(at("2020-12-04 22:30"), 0.0), (at("2020-12-04 23:30"), 0.0)]
        );
        assert_eq!(b.total(), 0.0);

        let summary = rain_summary([("A", &a), ("B", &b)]).unwrap();
        assert_eq!(summary.totals[0].0, "A");
        assert!((summary.mean - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_window_ignores_partial_hour() {
        let w = window("2020-12-04 22:00", "2020-12-04 23:30");
        let readings = vec![rain("2020-12-04 22:10", 1.0), rain("2020-12-04 23:10", 2.0)];
        let series = hourly_precipitation(&filter_window(&readings, &w), &w);
        assert_eq!(series.len(), 1);
        assert!((series.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rain_summary_needs_stations() {
        let empty: Vec<(&str, &HourlySeries)> = Vec::new();
        assert!(matches!(
            rain_summary(empty),
            Err(PipelineError::EmptyAggregationSet(_))
        ));
    }

    #[test]
    fn test_wind_statistics() {
        let readings = vec![
            wind("2020-12-04 22:00", 90.0, 8.1, 2.5),
            wind("2020-12-04 23:00", 180.0, 11.3, 3.5),
            wind("2020-12-05 00:00", 270.0, 6.0, 1.5),
        ];
        let stats = wind_statistics(&readings).unwrap();
        assert!((stats.max_gust - 11.3).abs() < 1e-9);
        assert!((stats.mean_speed - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_wind_statistics_single_record() {
        let readings = vec![wind("2020-12-04 22:00", 45.0, 4.2, 4.2)];
        let stats = wind_statistics(&readings).unwrap();
        assert_eq!(stats.max_gust, 4.2);
        assert_eq!(stats.mean_speed, 4.2);
        assert_eq!(stats.max_gust, stats.mean_speed);
    }

    #[test]
    fn test_wind_statistics_empty_set() {
        assert!(matches!(
            wind_statistics(&[]),
            Err(PipelineError::EmptyAggregationSet(_))
        ));
    }
}
