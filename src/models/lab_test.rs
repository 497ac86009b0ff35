use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTest {
    pub id: Uuid,
    pub name: String,
    /// Catalog code like "CBC" or "LFT". Unique.
    pub code: String,
    pub description: Option<String>,
    pub category: String,
    pub sub_category: Option<String>,
    pub sample_type: Option<String>,
    pub requirements: Option<String>,
    pub price: f64,
    pub duration_minutes: Option<i64>,
    pub report_delivery_hours: Option<i64>,
    pub is_active: bool,
    pub is_home_collection_available: bool,
    pub minimum_age: Option<i64>,
    pub maximum_age: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabTest {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.code)
    }

    /// Age bounds are inclusive; an unset bound does not constrain.
    pub fn is_available_for_age(&self, age: i64) -> bool {
        if let Some(min) = self.minimum_age {
            if age < min {
                return false;
            }
        }
        if let Some(max) = self.maximum_age {
            if age > max {
                return false;
            }
        }
        true
    }

    /// Estimated minutes from sample to delivered report.
    pub fn estimated_completion_minutes(&self) -> i64 {
        let test_time = self.duration_minutes.unwrap_or(30);
        let report_time = self.report_delivery_hours.unwrap_or(24) * 60;
        test_time + report_time
    }

    /// Price converted to integer minor-currency units.
    pub fn price_minor_units(&self) -> i64 {
        (self.price * 100.0).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_with_ages(min: Option<i64>, max: Option<i64>) -> LabTest {
        LabTest {
            id: Uuid::new_v4(),
            name: "Complete Blood Count".into(),
            code: "CBC".into(),
            description: None,
            category: "Blood Test".into(),
            sub_category: None,
            sample_type: Some("Blood".into()),
            requirements: None,
            price: 500.0,
            duration_minutes: None,
            report_delivery_hours: None,
            is_active: true,
            is_home_collection_available: false,
            minimum_age: min,
            maximum_age: max,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn age_bounds_are_inclusive() {
        let test = test_with_ages(Some(5), Some(18));
        assert!(!test.is_available_for_age(4));
        assert!(test.is_available_for_age(5));
        assert!(test.is_available_for_age(18));
        assert!(!test.is_available_for_age(25));
    }

    #[test]
    fn unset_bounds_do_not_constrain() {
        assert!(test_with_ages(None, None).is_available_for_age(99));
        assert!(test_with_ages(Some(1), None).is_available_for_age(120));
        assert!(!test_with_ages(None, Some(60)).is_available_for_age(61));
    }

    #[test]
    fn price_converts_to_minor_units() {
        assert_eq!(test_with_ages(None, None).price_minor_units(), 50_000);
    }

    #[test]
    fn completion_estimate_uses_defaults() {
        let mut test = test_with_ages(None, None);
        assert_eq!(test.estimated_completion_minutes(), 30 + 24 * 60);
        test.duration_minutes = Some(45);
        test.report_delivery_hours = Some(6);
        assert_eq!(test.estimated_completion_minutes(), 45 + 360);
    }
}
