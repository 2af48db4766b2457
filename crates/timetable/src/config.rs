//! Configuration for the extraction pipeline and calendar output.
//!
//! Everything the pipeline assumes about its input (source time zone,
//! plausibility limits, interval vocabulary, portal endpoints) lives here and
//! is handed to the pipeline explicitly.
use crate::error::TimetableError;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Time zone all timetable dates and times are assumed to be in.
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// IANA name of the source time zone
    pub timezone: String,
    /// Tables with more child rows than this are not schedule entries
    pub max_children: usize,
    /// How long before each event the alarm fires
    pub alarm_minutes_before: u32,
    /// Treat a document without tables as an empty timetable instead of an error
    pub allow_empty: bool,
    /// PRODID of the generated calendar
    pub product_id: String,
    pub intervals: IntervalVocabulary,
    pub portal: PortalConfig,
}

/// Interval tags the timetable uses, grouped by recurrence semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalVocabulary {
    pub weekly: Vec<String>,
    pub single: Vec<String>,
}

/// Where and how to log in to the timetable portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// URL the login form posts to
    pub login_url: Option<String>,
    /// URL of the personal timetable page (fetched after login)
    pub timetable_url: Option<String>,
    /// Form field carrying the user name
    pub username_field: String,
    /// Form field carrying the password
    pub password_field: String,
    /// Text that only appears on the login page; seeing it after posting
    /// credentials means the login was rejected
    pub login_page_marker: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            max_children: 10,
            alarm_minutes_before: 15,
            allow_empty: false,
            product_id: "-//timetable//Course Calendar//EN".to_string(),
            intervals: IntervalVocabulary::default(),
            portal: PortalConfig::default(),
        }
    }
}

impl Default for IntervalVocabulary {
    fn default() -> Self {
        Self {
            weekly: vec!["wtl".into(), "weekly".into(), "wöchentlich".into()],
            single: vec![
                "Einzel".into(),
                "Einzeltermin".into(),
                "single".into(),
                "einmalig".into(),
            ],
        }
    }
}

// Field names and marker match the HIS QIS login form.
impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            login_url: None,
            timetable_url: None,
            username_field: "asdf".to_string(),
            password_field: "fdsa".to_string(),
            login_page_marker: "loginForm".to_string(),
        }
    }
}

impl PortalConfig {
    pub fn new(login_url: &str, timetable_url: &str) -> Self {
        Self {
            login_url: Some(login_url.to_string()),
            timetable_url: Some(timetable_url.to_string()),
            ..Self::default()
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration from a JSON file. Missing keys fall back to
    /// their defaults.
    ///
    /// # Arguments
    /// * `path` - Path to the JSON configuration file
    ///
    /// # Returns
    /// * `Ok(PipelineConfig)` - The loaded and validated configuration
    /// * `Err` - If the file can't be read, parsed, or names an unknown time zone
    pub fn load(path: &Path) -> Result<Self, TimetableError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TimetableError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde can't.
    pub fn validate(&self) -> Result<(), TimetableError> {
        self.source_timezone()?;
        if self.max_children == 0 {
            return Err(TimetableError::config("max_children must be at least 1"));
        }
        if let Some(tag) = self
            .intervals
            .weekly
            .iter()
            .find(|t| self.intervals.single.contains(t))
        {
            return Err(TimetableError::config(format!(
                "interval tag {tag:?} is listed as both weekly and single"
            )));
        }
        Ok(())
    }

    /// Parses the configured IANA zone name.
    pub fn source_timezone(&self) -> Result<Tz, TimetableError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| TimetableError::config(format!("unknown time zone {:?}", self.timezone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(config.max_children, 10);
        assert_eq!(config.alarm_minutes_before, 15);
        assert!(!config.allow_empty);
        assert!(config.intervals.weekly.iter().any(|t| t == "wtl"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "timezone": "Europe/Vienna", "allow_empty": true }"#)
                .unwrap();
        assert_eq!(config.timezone, "Europe/Vienna");
        assert!(config.allow_empty);
        assert_eq!(config.max_children, 10);
        assert!(config.portal.login_url.is_none());
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let config = PipelineConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TimetableError::Config { .. })
        ));
    }

    #[test]
    fn test_overlapping_interval_tags_rejected() {
        let mut config = PipelineConfig::default();
        config.intervals.single.push("wtl".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.json");
        fs::write(&path, r#"{ "max_children": 12 }"#).unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.max_children, 12);
        assert_eq!(config.timezone, DEFAULT_TIMEZONE);
    }
}
