//! Nearest-time asof join of load onto weather within a tolerance.

use chrono::Duration;

use crate::domain::{JoinedRow, SeriesPoint, WeatherObservation};

/// Match every load row to the weather observation with the nearest timestamp
/// on either side, rejecting matches further than `tolerance` away. Ties at
/// equal distance resolve to the earlier weather timestamp. Load rows without
/// a match, or whose match lacks any of the three weather fields, are
/// dropped. Both inputs must be ordered by time.
pub fn align(
    load: &[SeriesPoint],
    weather: &[WeatherObservation],
    tolerance: Duration,
) -> Vec<JoinedRow> {
    let mut out = Vec::with_capacity(load.len());
    let mut cursor = 0usize;

    for point in load {
        while cursor < weather.len() && weather[cursor].ts < point.ts {
            cursor += 1;
        }
        let before = cursor.checked_sub(1).map(|i| &weather[i]);
        let at_or_after = weather.get(cursor);

        let nearest = match (before, at_or_after) {
            (Some(b), Some(a)) => {
                if point.ts - b.ts <= a.ts - point.ts {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => continue,
        };

        if (nearest.ts - point.ts).abs() > tolerance {
            continue;
        }
        let (Some(temperature_2m), Some(windspeed_10m), Some(precipitation)) = (
            nearest.temperature_2m,
            nearest.windspeed_10m,
            nearest.precipitation,
        ) else {
            continue;
        };
        out.push(JoinedRow {
            ts: point.ts,
            value: point.value,
            temperature_2m,
            windspeed_10m,
            precipitation,
        });
    }
    out
}
