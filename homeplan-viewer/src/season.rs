use chrono::{Datelike, NaiveDate};

use crate::scene::Color;

pub const SUMMER: Color = Color::rgb(0.227, 0.490, 0.173);
pub const EARLY_FALL: Color = Color::rgb(0.847, 0.608, 0.169);
pub const LATE_FALL: Color = Color::rgb(0.627, 0.271, 0.122);
pub const WINTER: Color = Color::rgb(0.420, 0.353, 0.263);

/// 树冠在某一日期的颜色与可见性。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoliageState {
    pub color: Color,
    pub visible: bool,
}

/// 只取决于月、日，与年份无关。4 至 10 月显示树冠；9 月由夏色渐变到初秋色，
/// 10 月由初秋色渐变到深秋色；其余月份隐藏树冠，颜色记为冬色。
pub fn foliage_state(date: NaiveDate) -> FoliageState {
    let progress = (f64::from(date.day()) - 1.0) / 30.0;
    match date.month() {
        4..=8 => FoliageState {
            color: SUMMER,
            visible: true,
        },
        9 => FoliageState {
            color: SUMMER.lerp(EARLY_FALL, progress),
            visible: true,
        },
        10 => FoliageState {
            color: EARLY_FALL.lerp(LATE_FALL, progress),
            visible: true,
        },
        _ => FoliageState {
            color: WINTER,
            visible: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn mid_june_is_plain_summer() {
        let state = foliage_state(date(2024, 6, 15));
        assert!(state.visible);
        assert_eq!(state.color, SUMMER);
    }

    #[test]
    fn new_year_hides_canopy() {
        let state = foliage_state(date(2024, 1, 1));
        assert!(!state.visible);
        assert_eq!(state.color, WINTER);
    }

    #[test]
    fn mid_september_is_halfway_to_early_fall() {
        let state = foliage_state(date(2024, 9, 16));
        assert!(state.visible);
        let expected = SUMMER.lerp(EARLY_FALL, 0.5);
        assert_relative_eq!(state.color.r, expected.r, epsilon = 1e-12);
        assert_relative_eq!(state.color.g, expected.g, epsilon = 1e-12);
        assert_relative_eq!(state.color.b, expected.b, epsilon = 1e-12);
        assert_relative_eq!(state.color.r, (SUMMER.r + EARLY_FALL.r) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn october_runs_from_early_to_late_fall() {
        assert_eq!(foliage_state(date(2023, 10, 1)).color, EARLY_FALL);
        let late = foliage_state(date(2023, 10, 31)).color;
        assert_relative_eq!(late.r, LATE_FALL.r, epsilon = 1e-12);
        assert_relative_eq!(late.g, LATE_FALL.g, epsilon = 1e-12);
        assert!(!foliage_state(date(2023, 11, 1)).visible);
        assert!(foliage_state(date(2023, 4, 1)).visible);
        assert!(!foliage_state(date(2023, 3, 31)).visible);
    }

    #[test]
    fn result_ignores_year() {
        assert_eq!(
            foliage_state(date(1999, 9, 20)),
            foliage_state(date(2031, 9, 20))
        );
    }
}
