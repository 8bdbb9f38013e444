//! Assumed travel speeds used to turn segment lengths into durations

use serde::Serialize;

use crate::{Error, Meters, Seconds};

/// A named assumed travel speed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedProfile {
    pub label: String,
    pub kmh: f64,
}

impl SpeedProfile {
    pub fn new(label: impl Into<String>, kmh: f64) -> Self {
        Self {
            label: label.into(),
            kmh,
        }
    }

    pub fn meters_per_second(&self) -> f64 {
        self.kmh * 1000.0 / 3600.0
    }

    pub fn travel_time(&self, length: Meters) -> Seconds {
        length / self.meters_per_second()
    }
}

/// Fixed, validated set of speed profiles. The fastest profile is the
/// baseline against which delays are measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedProfileSet {
    profiles: Vec<SpeedProfile>,
    #[serde(skip)]
    baseline: usize,
}

impl SpeedProfileSet {
    /// # Errors
    ///
    /// Returns `InvalidInput` if the set is empty, a speed is not a positive
    /// finite number, or two profiles share a label
    pub fn new(profiles: Vec<SpeedProfile>) -> Result<Self, Error> {
        if profiles.is_empty() {
            return Err(Error::InvalidInput(
                "At least one speed profile is required".to_string(),
            ));
        }
        for (idx, profile) in profiles.iter().enumerate() {
            if !profile.kmh.is_finite() || profile.kmh <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "Speed profile '{}' must have a positive speed, got {}",
                    profile.label, profile.kmh
                )));
            }
            if profiles[..idx].iter().any(|p| p.label == profile.label) {
                return Err(Error::InvalidInput(format!(
                    "Duplicate speed profile label '{}'",
                    profile.label
                )));
            }
        }

        // First fastest profile wins, keeping the choice stable for equal speeds
        let baseline = profiles
            .iter()
            .enumerate()
            .fold(0, |best, (idx, p)| if p.kmh > profiles[best].kmh { idx } else { best });

        Ok(Self { profiles, baseline })
    }

    fn from_static(profiles: &[(&str, f64)]) -> Self {
        let profiles = profiles
            .iter()
            .map(|&(label, kmh)| SpeedProfile::new(label, kmh))
            .collect();
        Self::new(profiles).unwrap_or_else(|e| unreachable!("static speed profiles are valid: {e}"))
    }

    /// Car profiles, 90 km/h being the non-flooded baseline
    pub fn car() -> Self {
        Self::from_static(&[
            ("5kph", 5.0),
            ("10kph", 10.0),
            ("20kph", 20.0),
            ("45kph", 45.0),
            ("72kph", 72.0),
            ("81kph", 81.0),
            ("90kph", 90.0),
        ])
    }

    /// Bus profiles, flooded crawl speeds plus the non-flooded baseline
    pub fn bus() -> Self {
        Self::from_static(&[
            ("5kmh_flooded", 5.0),
            ("10kmh_flooded", 10.0),
            ("20kmh_flooded", 20.0),
            ("non_flooded", 50.0),
        ])
    }

    /// Two-speed comparison used for per-hazard road impact reports
    pub fn flood_event() -> Self {
        Self::from_static(&[("20kmh", 20.0), ("50kmh", 50.0)])
    }

    pub fn baseline(&self) -> &SpeedProfile {
        &self.profiles[self.baseline]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpeedProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_kmh_to_seconds() {
        let profile = SpeedProfile::new("36", 36.0);
        assert_eq!(profile.meters_per_second(), 10.0);
        assert_eq!(profile.travel_time(250.0), 25.0);
        assert_eq!(profile.travel_time(0.0), 0.0);
    }

    #[test]
    fn baseline_is_the_fastest_profile() {
        assert_eq!(SpeedProfileSet::car().baseline().label, "90kph");
        assert_eq!(SpeedProfileSet::bus().baseline().label, "non_flooded");
        assert_eq!(SpeedProfileSet::car().len(), 7);
        assert_eq!(SpeedProfileSet::bus().len(), 4);
    }

    #[test]
    fn rejects_invalid_profile_sets() {
        assert!(SpeedProfileSet::new(vec![]).is_err());
        assert!(SpeedProfileSet::new(vec![SpeedProfile::new("zero", 0.0)]).is_err());
        assert!(
            SpeedProfileSet::new(vec![SpeedProfile::new("a", 5.0), SpeedProfile::new("a", 6.0)])
                .is_err()
        );
    }
}
