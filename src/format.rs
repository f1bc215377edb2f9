//! Human-readable speeds, durations and ASCII gauges.

use clap::ValueEnum;
use serde::Serialize;

/// Unit system used for every displayed rate.
#[derive(ValueEnum, Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Bytes,
    Bits,
}

const BYTE_UNITS: [&str; 5] = ["B/s  ", "KiB/s", "MiB/s", "GiB/s", "TiB/s"];
const BIT_UNITS: [&str; 5] = ["b/s  ", "Kib/s", "Mib/s", "Gib/s", "Tib/s"];

impl Units {
    /// Format a speed given in bytes per second as a fixed-width string.
    ///
    /// Missing or negative speeds read as zero.
    pub fn readable_speed(self, speed: Option<i64>) -> String {
        let speed = speed.filter(|s| *s >= 0).unwrap_or(0) as f64;
        match self {
            Units::Bytes => scaled(speed, &BYTE_UNITS),
            Units::Bits => scaled(speed * 8.0, &BIT_UNITS),
        }
    }
}

fn scaled(speed: f64, units: &[&str]) -> String {
    let mut step = 1.0f64;
    for unit in units {
        if step > 1.0 {
            let s = format!("{:4.2} ", speed / step);
            if s.len() <= 5 {
                return s + unit;
            }
            let s = format!("{:4.1} ", speed / step);
            if s.len() <= 5 {
                return s + unit;
            }
        }
        if speed / step < 1024.0 {
            return format!("{:4} ", (speed / step) as u64) + unit;
        }
        step *= 1024.0;
    }
    format!("{:4} ", (speed / (step / 1024.0)) as u64) + units[units.len() - 1]
}

const TIME_UNITS: [(f64, &str); 6] = [
    (1.0, "s"),
    (60.0, "m"),
    (60.0, "h"),
    (24.0, "d"),
    (7.0, "w"),
    (52.0, "y"),
];

/// Break a number of seconds down into `(count, suffix)` pairs, largest
/// unit first.
pub fn time_as_units(seconds: f64) -> Vec<(u64, &'static str)> {
    let mut seconds = seconds.max(0.0);
    let mut scale = 1.0;
    let mut top = None;
    for (i, (mul, _)) in TIME_UNITS.iter().enumerate() {
        if seconds / (scale * mul) < 1.0 {
            break;
        }
        top = Some(i);
        scale *= mul;
    }

    let Some(top) = top else {
        return Vec::new();
    };
    let mut out = Vec::with_capacity(top + 1);
    for i in (0..=top).rev() {
        let (mul, suffix) = TIME_UNITS[i];
        let value = (seconds / scale) as u64;
        seconds -= value as f64 * scale;
        scale /= mul;
        out.push((value, suffix));
    }
    out
}

/// Render seconds like `1h 2m 5s`, dropping trailing units that would push
/// the string past `columns`.
pub fn readable_time(seconds: Option<f64>, columns: Option<usize>) -> String {
    let mut out = String::new();
    for (value, suffix) in time_as_units(seconds.unwrap_or(0.0)) {
        let mut next = out.clone();
        if !next.is_empty() {
            next.push(' ');
        }
        next.push_str(&format!("{value}{suffix}"));
        if columns.map_or(false, |c| next.len() > c) {
            break;
        }
        out = next;
    }
    out
}

const SPEED_GFX: [&str; 21] = [
    r"\                    ",
    r".\                   ",
    r"..\                  ",
    r"...\                 ",
    r"...:\                ",
    r"...::\               ",
    r"...:::\              ",
    r"...:::+|             ",
    r"...:::++|            ",
    r"...:::+++|           ",
    r"...:::+++#|          ",
    r"...:::+++##|         ",
    r"...:::+++###|        ",
    r"...:::+++###%|       ",
    r"...:::+++###%%/      ",
    r"...:::+++###%%%/     ",
    r"...:::+++###%%%//    ",
    r"...:::+++###%%%///   ",
    r"...:::+++###%%%////  ",
    r"...:::+++###%%%///// ",
    r"...:::+++###%%%//////",
];

/// ASCII gauge for a speed in bytes per second, on a scale of 2^(5/3)
/// steps.
pub fn graphic_speed(speed: Option<i64>) -> &'static str {
    let speed = speed.unwrap_or(0) as f64;
    let steps: Vec<f64> = std::iter::once(0.0)
        .chain((0..20).map(|x| 2f64.powf(x as f64 * 5.0 / 3.0).trunc()))
        .collect();
    for i in 0..steps.len() - 1 {
        let (low, high) = (steps[i], steps[i + 1]);
        if speed > high {
            continue;
        }
        return if speed - low < high - speed {
            SPEED_GFX[i]
        } else {
            SPEED_GFX[i + 1]
        };
    }
    SPEED_GFX[SPEED_GFX.len() - 1]
}

/// `#`/`-` bar of `columns` characters filled to `fraction`.
pub fn graphic_progress(fraction: f64, columns: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0)) * columns as f64) as usize;
    format!("{}{}", "#".repeat(filled), "-".repeat(columns - filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_speed_bytes() {
        let b = Units::Bytes;
        assert_eq!(b.readable_speed(None), "   0 B/s  ");
        assert_eq!(b.readable_speed(Some(-20)), "   0 B/s  ");
        assert_eq!(b.readable_speed(Some(250)), " 250 B/s  ");
        assert_eq!(b.readable_speed(Some(1000)), "1000 B/s  ");
        assert_eq!(b.readable_speed(Some(2048)), "2.00 KiB/s");
        assert_eq!(b.readable_speed(Some(20_000)), "19.5 KiB/s");
        assert_eq!(b.readable_speed(Some(200_000)), " 195 KiB/s");
        assert_eq!(b.readable_speed(Some(3 << 30)), "3.00 GiB/s");
    }

    #[test]
    fn readable_speed_bits() {
        let b = Units::Bits;
        assert_eq!(b.readable_speed(Some(100)), " 800 b/s  ");
        assert_eq!(b.readable_speed(Some(128)), "1.00 Kib/s");
    }

    #[test]
    fn readable_speed_caps_at_largest_unit() {
        let s = Units::Bytes.readable_speed(Some(i64::MAX / 2));
        assert!(s.ends_with("TiB/s"), "{s}");
    }

    #[test]
    fn time_units_breakdown() {
        assert!(time_as_units(0.0).is_empty());
        assert_eq!(time_as_units(90.0), vec![(1, "m"), (30, "s")]);
        assert_eq!(time_as_units(3725.0), vec![(1, "h"), (2, "m"), (5, "s")]);
    }

    #[test]
    fn readable_time_respects_columns() {
        assert_eq!(readable_time(Some(3725.0), None), "1h 2m 5s");
        assert_eq!(readable_time(Some(3725.0), Some(5)), "1h 2m");
        assert_eq!(readable_time(None, Some(10)), "");
    }

    #[test]
    fn graphic_speed_extremes() {
        assert_eq!(graphic_speed(None), SPEED_GFX[0]);
        assert_eq!(graphic_speed(Some(i64::MAX)), SPEED_GFX[20]);
        assert_eq!(graphic_speed(Some(1)), SPEED_GFX[1]);
    }

    #[test]
    fn graphic_progress_fills_fraction() {
        assert_eq!(graphic_progress(0.5, 8), "####----");
        assert_eq!(graphic_progress(2.0, 4), "####");
        assert_eq!(graphic_progress(-1.0, 3), "---");
    }
}
