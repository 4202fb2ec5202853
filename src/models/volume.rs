use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::ImagingCategory;

/// Volumetric measurements paired with a follow-up study. Volumes are in mL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeInputs {
    pub baseline_date: Option<NaiveDate>,
    pub followup_date: Option<NaiveDate>,
    pub baseline_flair_volume: Option<f64>,
    pub followup_flair_volume: Option<f64>,
    pub flair_change_pct: Option<f64>,
    pub baseline_enhancement_volume: Option<f64>,
    pub followup_enhancement_volume: Option<f64>,
    pub enhancement_change_pct: Option<f64>,
    /// Radiation completion date supplied with the imaging record, used
    /// when the note yields none.
    pub radiation_date: Option<NaiveDate>,
}

impl VolumeInputs {
    pub fn flair_abs_change(&self) -> Option<f64> {
        Some(self.followup_flair_volume? - self.baseline_flair_volume?)
    }

    pub fn enhancement_abs_change(&self) -> Option<f64> {
        Some(self.followup_enhancement_volume? - self.baseline_enhancement_volume?)
    }

    /// Stated FLAIR change, or one derived from the two volumes.
    pub fn flair_pct(&self) -> Option<f64> {
        self.flair_change_pct.or_else(|| {
            percent_change(self.baseline_flair_volume?, self.followup_flair_volume?)
        })
    }

    pub fn enhancement_pct(&self) -> Option<f64> {
        self.enhancement_change_pct.or_else(|| {
            percent_change(
                self.baseline_enhancement_volume?,
                self.followup_enhancement_volume?,
            )
        })
    }

    pub fn has_volume_data(&self) -> bool {
        self.flair_pct().is_some() && self.enhancement_pct().is_some()
    }
}

fn percent_change(baseline: f64, followup: f64) -> Option<f64> {
    (baseline > 0.0).then(|| (followup - baseline) / baseline * 100.0)
}

/// Resolved imaging direction for one decision run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAssessment {
    pub flair_change_pct: f64,
    pub enhancement_change_pct: f64,
    pub flair_abs_change: Option<f64>,
    pub enh_abs_change: Option<f64>,
    pub flair_category: ImagingCategory,
    pub enhancement_category: ImagingCategory,
    pub mixed_pattern: bool,
    pub category: ImagingCategory,
    pub reasoning: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stated_percent_wins_over_volumes() {
        let v = VolumeInputs {
            baseline_flair_volume: Some(10.0),
            followup_flair_volume: Some(20.0),
            flair_change_pct: Some(5.0),
            ..Default::default()
        };
        assert_eq!(v.flair_pct(), Some(5.0));
        assert_eq!(v.flair_abs_change(), Some(10.0));
    }

    #[test]
    fn percent_derived_from_volumes() {
        let v = VolumeInputs {
            baseline_enhancement_volume: Some(4.0),
            followup_enhancement_volume: Some(3.0),
            ..Default::default()
        };
        assert_eq!(v.enhancement_pct(), Some(-25.0));
    }

    #[test]
    fn zero_baseline_gives_no_percent() {
        let v = VolumeInputs {
            baseline_flair_volume: Some(0.0),
            followup_flair_volume: Some(3.0),
            ..Default::default()
        };
        assert_eq!(v.flair_pct(), None);
        assert!(!v.has_volume_data());
    }
}
