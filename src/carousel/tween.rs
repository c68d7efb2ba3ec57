//! Interval interpolation: eased ramps sampled against wall-clock instants.
//!
//! A [`Tween`] never schedules anything on its own. The render loop samples it
//! once per frame and the tween reports [`TweenStep::Settled`] exactly once,
//! on the first sample at or past its end. Replacing a tween (dropping it)
//! never fires its completion.

use std::f32::consts::TAU;
use std::fmt;
use std::time::{Duration, Instant};

use serde::de::{self, Deserializer};
use serde::Deserialize;

/// Easing curves used by the carousel ramps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Linear,
    CubicInOut,
    ExpoInOut,
    /// Damped overshoot; `amplitude >= 1`, `period` in units of the ramp.
    ElasticOut { amplitude: f32, period: f32 },
}

impl Easing {
    pub const ELASTIC_OUT: Self = Self::ElasticOut {
        amplitude: 1.2,
        period: 1.0,
    };

    /// Maps linear time `t` in `[0, 1]` onto eased progress.
    ///
    /// Every curve hits exactly `0.0` at `t = 0` and exactly `1.0` at `t = 1`.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Self::Linear => t,
            Self::CubicInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Self::ExpoInOut => {
                let expo_in = |p: f32| 2f32.powf(10.0 * (p - 1.0));
                if t < 0.5 {
                    expo_in(t * 2.0) / 2.0
                } else {
                    1.0 - expo_in((1.0 - t) * 2.0) / 2.0
                }
            }
            Self::ElasticOut { amplitude, period } => {
                let amplitude = amplitude.max(1.0);
                let period = period.max(f32::EPSILON);
                let phase = period / TAU * (1.0 / amplitude).asin();
                amplitude * 2f32.powf(-10.0 * t) * ((t - phase) * TAU / period).sin() + 1.0
            }
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed {
            "linear" => return Some(Self::Linear),
            "cubic-in-out" => return Some(Self::CubicInOut),
            "expo-in-out" => return Some(Self::ExpoInOut),
            "elastic-out" => return Some(Self::ELASTIC_OUT),
            _ => {}
        }
        let args = trimmed.strip_prefix("elastic-out(")?.strip_suffix(')')?;
        let mut parts = args.split(',').map(|part| part.trim().parse::<f32>());
        let amplitude = parts.next()?.ok()?;
        let period = parts.next()?.ok()?;
        if parts.next().is_some() || !amplitude.is_finite() || !period.is_finite() || period <= 0.0
        {
            return None;
        }
        Some(Self::ElasticOut { amplitude, period })
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => f.write_str("linear"),
            Self::CubicInOut => f.write_str("cubic-in-out"),
            Self::ExpoInOut => f.write_str("expo-in-out"),
            Self::ElasticOut { amplitude, period } => {
                write!(f, "elastic-out({amplitude}, {period})")
            }
        }
    }
}

impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            de::Error::invalid_value(
                de::Unexpected::Str(&raw),
                &"linear, cubic-in-out, expo-in-out, elastic-out or elastic-out(<amplitude>, <period>)",
            )
        })
    }
}

/// Result of sampling a [`Tween`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TweenStep {
    /// Still ramping; carries the current value.
    Running(f32),
    /// First sample at or past the end; carries exactly the target value.
    Settled(f32),
    /// Already reported settled on an earlier sample.
    Finished(f32),
}

impl TweenStep {
    pub fn value(self) -> f32 {
        match self {
            Self::Running(v) | Self::Settled(v) | Self::Finished(v) => v,
        }
    }
}

/// Eased ramp from `from` to `to` over `duration`, optionally delayed.
#[derive(Debug, Clone)]
pub struct Tween {
    from: f32,
    to: f32,
    delay: Duration,
    duration: Duration,
    easing: Easing,
    started_at: Instant,
    settled: bool,
}

impl Tween {
    pub fn new(from: f32, to: f32, duration: Duration, easing: Easing, now: Instant) -> Self {
        Self {
            from,
            to,
            delay: Duration::ZERO,
            duration,
            easing,
            started_at: now,
            settled: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Instant at which the ramp reaches its target.
    pub fn ends_at(&self) -> Instant {
        self.started_at + self.delay + self.duration
    }

    /// Pure read of the value at `now`, without touching completion state.
    pub fn value_at(&self, now: Instant) -> f32 {
        let local = now
            .saturating_duration_since(self.started_at)
            .saturating_sub(self.delay);
        if local >= self.duration {
            return self.to;
        }
        let t = local.as_secs_f32() / self.duration.as_secs_f32();
        self.from + (self.to - self.from) * self.easing.apply(t)
    }

    /// Samples the ramp, reporting completion once.
    pub fn poll(&mut self, now: Instant) -> TweenStep {
        if self.settled {
            return TweenStep::Finished(self.to);
        }
        if now >= self.ends_at() {
            self.settled = true;
            return TweenStep::Settled(self.to);
        }
        TweenStep::Running(self.value_at(now))
    }
}

/// A group of identical ramps whose starts are offset by `stagger` each.
#[derive(Debug, Clone)]
pub struct Stagger {
    tweens: Vec<Tween>,
}

impl Stagger {
    pub fn new(
        count: usize,
        from: f32,
        to: f32,
        duration: Duration,
        stagger: Duration,
        easing: Easing,
        now: Instant,
    ) -> Self {
        let tweens = (0..count)
            .map(|i| {
                let offset = stagger.saturating_mul(u32::try_from(i).unwrap_or(u32::MAX));
                Tween::new(from, to, duration, easing, now).with_delay(offset)
            })
            .collect();
        Self { tweens }
    }

    /// Samples every member; returns the values and whether all have settled.
    pub fn poll(&mut self, now: Instant) -> (Vec<f32>, bool) {
        let mut all_done = true;
        let values = self
            .tweens
            .iter_mut()
            .map(|tween| {
                let step = tween.poll(now);
                if matches!(step, TweenStep::Running(_)) {
                    all_done = false;
                }
                step.value()
            })
            .collect();
        (values, all_done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 4] = [
        Easing::Linear,
        Easing::CubicInOut,
        Easing::ExpoInOut,
        Easing::ELASTIC_OUT,
    ];

    #[test]
    fn easings_hit_their_endpoints() {
        for easing in ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{easing}");
            assert_eq!(easing.apply(1.0), 1.0, "{easing}");
            assert_eq!(easing.apply(-3.0), 0.0, "{easing}");
            assert_eq!(easing.apply(7.0), 1.0, "{easing}");
        }
    }

    #[test]
    fn expo_in_out_is_monotonic_and_symmetric() {
        let mut last = 0.0;
        for i in 0..=200 {
            let v = Easing::ExpoInOut.apply(i as f32 / 200.0);
            assert!(v >= last, "expo-in-out decreased at step {i}");
            last = v;
        }
        assert!((Easing::ExpoInOut.apply(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn elastic_out_overshoots() {
        let peak = (1..100)
            .map(|i| Easing::ELASTIC_OUT.apply(i as f32 / 100.0))
            .fold(f32::MIN, f32::max);
        assert!(peak > 1.0);
    }

    #[test]
    fn parses_easing_names() {
        let parsed: Vec<Easing> =
            serde_yaml::from_str("[linear, expo-in-out, elastic-out, \"elastic-out(1.5, 0.4)\"]")
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                Easing::Linear,
                Easing::ExpoInOut,
                Easing::ELASTIC_OUT,
                Easing::ElasticOut {
                    amplitude: 1.5,
                    period: 0.4
                },
            ]
        );
        assert!(serde_yaml::from_str::<Easing>("bounce").is_err());
        assert!(serde_yaml::from_str::<Easing>("\"elastic-out(1.0, 0)\"").is_err());
    }

    #[test]
    fn tween_settles_exactly_once() {
        let start = Instant::now();
        let mut tween = Tween::new(0.0, 1.0, Duration::from_millis(100), Easing::Linear, start);
        assert!(matches!(
            tween.poll(start + Duration::from_millis(50)),
            TweenStep::Running(v) if (v - 0.5).abs() < 1e-3
        ));
        assert_eq!(
            tween.poll(start + Duration::from_millis(150)),
            TweenStep::Settled(1.0)
        );
        assert_eq!(
            tween.poll(start + Duration::from_millis(200)),
            TweenStep::Finished(1.0)
        );
    }

    #[test]
    fn delay_holds_the_start_value() {
        let start = Instant::now();
        let mut tween = Tween::new(0.0, 1.0, Duration::from_millis(100), Easing::Linear, start)
            .with_delay(Duration::from_millis(200));
        assert_eq!(
            tween.poll(start + Duration::from_millis(150)),
            TweenStep::Running(0.0)
        );
        assert_eq!(tween.ends_at(), start + Duration::from_millis(300));
    }

    #[test]
    fn replacing_a_tween_never_reports_its_completion() {
        let start = Instant::now();
        let mut slot = Some(Tween::new(
            0.0,
            1.0,
            Duration::from_millis(100),
            Easing::Linear,
            start,
        ));
        slot = Some(Tween::new(
            0.0,
            1.0,
            Duration::from_millis(500),
            Easing::Linear,
            start,
        ));
        let step = slot
            .as_mut()
            .map(|tween| tween.poll(start + Duration::from_millis(150)));
        assert!(matches!(step, Some(TweenStep::Running(_))));
    }

    #[test]
    fn stagger_offsets_each_member() {
        let start = Instant::now();
        let mut stagger = Stagger::new(
            3,
            1.0,
            0.0,
            Duration::from_millis(100),
            Duration::from_millis(20),
            Easing::Linear,
            start,
        );
        let (values, done) = stagger.poll(start + Duration::from_millis(50));
        assert!(!done);
        assert!(values[0] < values[1] && values[1] < values[2]);
        let (values, done) = stagger.poll(start + Duration::from_millis(140));
        assert!(done);
        assert_eq!(values, vec![0.0, 0.0, 0.0]);
    }
}
