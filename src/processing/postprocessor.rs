//! Prediction post-processing
//!
//! Business rules applied to raw model outputs: the class label table and
//! the stress score clamp. Both are pure and independent of any model.

use serde::Serialize;

/// Emotion labels in class-index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EmotionLabel {
    Sad,
    Tired,
    Angry,
    Anxious,
    Neutral,
    /// Any class index outside the table
    Unknown,
}

impl EmotionLabel {
    pub const TABLE: [EmotionLabel; 5] = [
        EmotionLabel::Sad,
        EmotionLabel::Tired,
        EmotionLabel::Angry,
        EmotionLabel::Anxious,
        EmotionLabel::Neutral,
    ];

    pub fn from_class_index(index: i64) -> Self {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::TABLE.get(i).copied())
            .unwrap_or(EmotionLabel::Unknown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EmotionLabel::Sad => "Sad",
            EmotionLabel::Tired => "Tired",
            EmotionLabel::Angry => "Angry",
            EmotionLabel::Anxious => "Anxious",
            EmotionLabel::Neutral => "Neutral",
            EmotionLabel::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const STRESS_MIN: f64 = 1.0;
pub const STRESS_MAX: f64 = 10.0;

/// Clamp a raw regressor output into `[STRESS_MIN, STRESS_MAX]`.
pub fn clamp_stress(raw: f64) -> f64 {
    raw.clamp(STRESS_MIN, STRESS_MAX)
}

/// Round to one decimal place, halves away from zero.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamp then round. The raw value must not be NaN.
pub fn finalize_stress(raw: f32) -> f32 {
    round_one_decimal(clamp_stress(raw as f64)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_table() {
        assert_eq!(EmotionLabel::from_class_index(0), EmotionLabel::Sad);
        assert_eq!(EmotionLabel::from_class_index(1), EmotionLabel::Tired);
        assert_eq!(EmotionLabel::from_class_index(2), EmotionLabel::Angry);
        assert_eq!(EmotionLabel::from_class_index(3), EmotionLabel::Anxious);
        assert_eq!(EmotionLabel::from_class_index(4), EmotionLabel::Neutral);
        for i in 0..5 {
            assert!(!EmotionLabel::from_class_index(i).as_str().is_empty());
        }
    }

    #[test]
    fn test_out_of_range_index_is_unknown() {
        for i in [-1, 5, 99, i64::MIN, i64::MAX] {
            assert_eq!(EmotionLabel::from_class_index(i), EmotionLabel::Unknown);
        }
        assert_eq!(EmotionLabel::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_label_serializes_as_name() {
        assert_eq!(serde_json::to_string(&EmotionLabel::Anxious).unwrap(), "\"Anxious\"");
    }

    #[test]
    fn test_clamp_bounds() {
        for raw in [-50.0, 0.0, 5.5, 15.0, 1000.0, f32::INFINITY, f32::NEG_INFINITY] {
            let score = finalize_stress(raw);
            assert!((1.0..=10.0).contains(&score), "raw {} gave {}", raw, score);
        }
        assert_eq!(finalize_stress(-50.0), 1.0);
        assert_eq!(finalize_stress(0.0), 1.0);
        assert_eq!(finalize_stress(5.5), 5.5);
        assert_eq!(finalize_stress(15.0), 10.0);
        assert_eq!(finalize_stress(1000.0), 10.0);
    }

    #[test]
    fn test_rounding_rule() {
        assert_eq!(finalize_stress(12.34), 10.0);
        assert_eq!(finalize_stress(0.2), 1.0);
        assert_eq!(finalize_stress(6.25), 6.3);
        assert_eq!(finalize_stress(6.24), 6.2);
        assert_eq!(round_one_decimal(-2.25), -2.3);
    }
}
