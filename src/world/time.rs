use std::time::Duration;

pub const HOURS_PER_DAY: f64 = 24.0;

/// Default scale: game time runs 24x real time, one full day per real
/// hour.
pub const DEFAULT_TIME_SCALE: f64 = 24.0;

/// Simulated hour-of-day clock. The value lives in `[0, 24)` and wraps;
/// it is a looping day/night cycle with no notion of calendar date.
#[derive(Debug, Clone)]
pub struct WorldClock {
    hour: f64,
    scale: f64,
}

impl WorldClock {
    pub fn new(scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            DEFAULT_TIME_SCALE
        };
        WorldClock { hour: 12.0, scale }
    }

    pub fn hour(&self) -> f64 {
        self.hour
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Advance by real elapsed time, scaled.
    pub fn advance(&mut self, elapsed: Duration) {
        let game_hours = elapsed.as_secs_f64() / 3600.0 * self.scale;
        self.hour = (self.hour + game_hours).rem_euclid(HOURS_PER_DAY);
    }

    /// Force the clock to an explicit hour value.
    pub fn set_hour(&mut self, hour: f64) -> Result<(), String> {
        if !hour.is_finite() || !(0.0..HOURS_PER_DAY).contains(&hour) {
            return Err(format!("hour {} outside [0, 24)", hour));
        }
        self.hour = hour;
        Ok(())
    }

    pub fn is_night(&self) -> bool {
        self.hour < 6.0 || self.hour >= 20.0
    }
}

/// Render an hour value as "HH:MM".
pub fn format_hour_minutes(hour: f64) -> String {
    let clamped = hour.rem_euclid(HOURS_PER_DAY);
    let h = clamped as u32;
    let m = ((clamped - h as f64) * 60.0).round() as u32;
    let (h, m) = if m >= 60 { ((h + 1) % 24, 0) } else { (h, m) };
    format!("{:02}:{:02}", h, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_scales_real_time() {
        let mut clock = WorldClock::new(24.0);
        clock.set_hour(0.0).unwrap();
        // 150 real seconds at 24x is one game hour.
        clock.advance(Duration::from_secs(150));
        assert!((clock.hour() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn clock_wraps_at_midnight() {
        let mut clock = WorldClock::new(24.0);
        clock.set_hour(23.5).unwrap();
        clock.advance(Duration::from_secs(150));
        assert!((clock.hour() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn set_hour_rejects_out_of_range() {
        let mut clock = WorldClock::new(24.0);
        assert!(clock.set_hour(24.0).is_err());
        assert!(clock.set_hour(-0.1).is_err());
        assert!(clock.set_hour(f64::NAN).is_err());
        clock.set_hour(13.5).unwrap();
        assert_eq!(clock.hour(), 13.5);
    }

    #[test]
    fn invalid_scale_falls_back_to_default() {
        let clock = WorldClock::new(0.0);
        assert_eq!(clock.scale(), DEFAULT_TIME_SCALE);
        let clock = WorldClock::new(f64::NAN);
        assert_eq!(clock.scale(), DEFAULT_TIME_SCALE);
    }

    #[test]
    fn night_spans_evening_and_early_morning() {
        let mut clock = WorldClock::new(24.0);
        clock.set_hour(0.0).unwrap();
        assert!(clock.is_night());
        clock.set_hour(12.0).unwrap();
        assert!(!clock.is_night());
        clock.set_hour(21.0).unwrap();
        assert!(clock.is_night());
    }

    #[test]
    fn hour_minutes_formatting() {
        assert_eq!(format_hour_minutes(0.0), "00:00");
        assert_eq!(format_hour_minutes(13.5), "13:30");
        assert_eq!(format_hour_minutes(23.999), "00:00");
    }
}
