//! Emergency alert domain types.
//!
//! `AlertInput` is what clients submit; `AlertInput::validate` turns it into a
//! typed `NewAlert` or a `Validation` error. `EmergencyAlert` is the stored
//! shape, with the read-time values (`is_active`, `urgency_score`, ...)
//! computed from an explicit `now`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AlertError, AlertResult};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

pub const RADIUS_KM_RANGE: (f64, f64) = (1.0, 50.0);
pub const DELAY_SECS_RANGE: (i32, i32) = (0, 3600);
pub const DURATION_HOURS_RANGE: (i32, i32) = (1, 168);

macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AlertError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(AlertError::Validation(format!(
                        "{} must be one of [{}], got '{}'",
                        $field,
                        [$($text),+].join(", "),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum!(AlertType, "alertType" {
    LostPet => "lost_pet",
    FoundPet => "found_pet",
    MedicalEmergency => "medical_emergency",
    Accident => "accident",
    NaturalDisaster => "natural_disaster",
});

string_enum!(
    /// Declaration order is severity order.
    UrgencyLevel, "urgencyLevel" {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

string_enum!(AlertStatus, "status" {
    Active => "active",
    Resolved => "resolved",
    Cancelled => "cancelled",
    Expired => "expired",
});

string_enum!(ResponseType, "responseType" {
    Sighting => "sighting",
    HelpOffered => "help_offered",
    Information => "information",
    Resolved => "resolved",
});

string_enum!(AttachmentType, "attachment type" {
    Photo => "photo",
    Video => "video",
    Audio => "audio",
    Document => "document",
});

string_enum!(ContactMethod, "preferredContact" {
    Phone => "phone",
    Wechat => "wechat",
    Email => "email",
});

impl UrgencyLevel {
    /// low=1 .. critical=4
    pub fn weight(&self) -> i16 {
        match self {
            UrgencyLevel::Low => 1,
            UrgencyLevel::Medium => 2,
            UrgencyLevel::High => 3,
            UrgencyLevel::Critical => 4,
        }
    }
}

impl Default for UrgencyLevel {
    fn default() -> Self {
        UrgencyLevel::Medium
    }
}

impl AlertStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AlertStatus::Active)
    }
}

impl Default for ContactMethod {
    fn default() -> Self {
        ContactMethod::Phone
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub attachment_type: AttachmentType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wechat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_contact: ContactMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationSettings {
    pub force_propagation: bool,
    /// Kilometres.
    pub propagation_radius: f64,
    /// Seconds.
    pub propagation_delay: i32,
    /// Hours.
    pub propagation_duration: i32,
}

impl Default for PropagationSettings {
    fn default() -> Self {
        Self {
            force_propagation: true,
            propagation_radius: 5.0,
            propagation_delay: 0,
            propagation_duration: 24,
        }
    }
}

impl PropagationSettings {
    pub fn validate(&self) -> AlertResult<()> {
        check_radius(self.propagation_radius)?;
        check_delay(self.propagation_delay)?;
        check_duration(self.propagation_duration)
    }
}

/// Caller-supplied propagation overrides; absent fields fall back to policy defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationRequest {
    #[serde(default)]
    pub force_propagation: Option<bool>,
    #[serde(default)]
    pub propagation_radius: Option<f64>,
    #[serde(default)]
    pub propagation_delay: Option<i32>,
    #[serde(default)]
    pub propagation_duration: Option<i32>,
}

impl PropagationRequest {
    pub fn validate(&self) -> AlertResult<()> {
        if let Some(radius) = self.propagation_radius {
            check_radius(radius)?;
        }
        if let Some(delay) = self.propagation_delay {
            check_delay(delay)?;
        }
        if let Some(duration) = self.propagation_duration {
            check_duration(duration)?;
        }
        Ok(())
    }
}

fn check_radius(radius: f64) -> AlertResult<()> {
    let (min, max) = RADIUS_KM_RANGE;
    if !radius.is_finite() || radius < min || radius > max {
        return Err(AlertError::validation(format!(
            "propagationRadius must be between {} and {} km, got {}",
            min, max, radius
        )));
    }
    Ok(())
}

fn check_delay(delay: i32) -> AlertResult<()> {
    let (min, max) = DELAY_SECS_RANGE;
    if delay < min || delay > max {
        return Err(AlertError::validation(format!(
            "propagationDelay must be between {} and {} seconds, got {}",
            min, max, delay
        )));
    }
    Ok(())
}

pub(crate) fn check_duration(hours: i32) -> AlertResult<()> {
    let (min, max) = DURATION_HOURS_RANGE;
    if hours < min || hours > max {
        return Err(AlertError::validation(format!(
            "propagationDuration must be between {} and {} hours, got {}",
            min, max, hours
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub user_id: i32,
    pub response_type: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationStats {
    pub total_reached: i64,
    pub total_views: i64,
    pub total_shares: i64,
    pub total_responses: i64,
}

impl PropagationStats {
    /// Applies cumulative totals. A counter never moves backwards.
    pub fn merge(&mut self, update: &StatsUpdate) {
        fn raise(current: &mut i64, provided: Option<i64>) {
            if let Some(value) = provided {
                *current = (*current).max(value);
            }
        }
        raise(&mut self.total_reached, update.total_reached);
        raise(&mut self.total_views, update.total_views);
        raise(&mut self.total_shares, update.total_shares);
        raise(&mut self.total_responses, update.total_responses);
    }
}

/// Partial cumulative totals reported by the fan-out collaborator or clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    #[serde(default)]
    pub total_reached: Option<i64>,
    #[serde(default)]
    pub total_views: Option<i64>,
    #[serde(default)]
    pub total_shares: Option<i64>,
    #[serde(default)]
    pub total_responses: Option<i64>,
}

impl StatsUpdate {
    pub fn validate(&self) -> AlertResult<()> {
        let fields = [
            ("totalReached", self.total_reached),
            ("totalViews", self.total_views),
            ("totalShares", self.total_shares),
            ("totalResponses", self.total_responses),
        ];
        for (name, value) in fields {
            if matches!(value, Some(v) if v < 0) {
                return Err(AlertError::validation(format!("{} cannot be negative", name)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub pet_id: i32,
    pub reporter_id: i32,
    pub title: String,
    pub description: String,
    pub location: Location,
    pub incident_time: DateTime<Utc>,
    pub report_time: DateTime<Utc>,
    pub urgency_level: UrgencyLevel,
    pub status: AlertStatus,
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<ContactInfo>,
    pub propagation_settings: PropagationSettings,
    pub responses: Vec<ResponseEntry>,
    pub propagation_stats: PropagationStats,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyAlert {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == AlertStatus::Active && self.expires_at.map_or(true, |at| at > now)
    }

    pub fn time_since_incident(&self, now: DateTime<Utc>) -> Duration {
        now - self.incident_time
    }

    /// Urgency weight plus a staleness bonus that reaches +1 after 24 hours.
    pub fn urgency_score(&self, now: DateTime<Utc>) -> f64 {
        let hours = self.time_since_incident(now).num_seconds() as f64 / 3600.0;
        let staleness = (hours / 24.0).clamp(0.0, 1.0);
        f64::from(self.urgency_level.weight()) + staleness
    }
}

/// An alert as rendered to clients, with its derived values.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: EmergencyAlert,
    pub is_active: bool,
    pub time_since_incident_secs: i64,
    pub urgency_score: f64,
}

impl AlertView {
    pub fn at(alert: EmergencyAlert, now: DateTime<Utc>) -> Self {
        Self {
            is_active: alert.is_active(now),
            time_since_incident_secs: alert.time_since_incident(now).num_seconds(),
            urgency_score: alert.urgency_score(now),
            alert,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationInput {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl LocationInput {
    pub fn validate(self, field: &str) -> AlertResult<Location> {
        let latitude = self
            .latitude
            .ok_or_else(|| missing(&format!("{}.latitude", field)))?;
        let longitude = self
            .longitude
            .ok_or_else(|| missing(&format!("{}.longitude", field)))?;
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(AlertError::validation(format!(
                "{}.latitude must be between -90 and 90, got {}",
                field, latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(AlertError::validation(format!(
                "{}.longitude must be between -180 and 180, got {}",
                field, longitude
            )));
        }
        if matches!(self.accuracy, Some(a) if a < 0.0) {
            return Err(AlertError::validation(format!(
                "{}.accuracy cannot be negative",
                field
            )));
        }
        Ok(Location {
            latitude,
            longitude,
            address: trimmed(self.address),
            accuracy: self.accuracy,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    #[serde(rename = "type")]
    pub attachment_type: String,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfoInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub wechat: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_contact: Option<String>,
}

impl ContactInfoInput {
    fn validate(self) -> AlertResult<ContactInfo> {
        let preferred_contact = match self.preferred_contact.as_deref() {
            Some(method) => method.parse()?,
            None => ContactMethod::default(),
        };
        Ok(ContactInfo {
            name: trimmed(self.name),
            phone: trimmed(self.phone),
            wechat: trimmed(self.wechat),
            email: trimmed(self.email),
            preferred_contact,
        })
    }
}

/// Alert submission as received from clients. Enum-valued fields arrive as
/// strings so that unknown values surface as validation errors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertInput {
    pub alert_type: Option<String>,
    pub pet_id: Option<i32>,
    pub reporter_id: Option<i32>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<LocationInput>,
    pub incident_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub urgency_level: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
    #[serde(default)]
    pub contact_info: Option<ContactInfoInput>,
    #[serde(default)]
    pub propagation_settings: Option<PropagationRequest>,
}

/// A validated alert, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub pet_id: i32,
    pub reporter_id: i32,
    pub title: String,
    pub description: String,
    pub location: Location,
    pub incident_time: DateTime<Utc>,
    pub urgency_level: UrgencyLevel,
    pub attachments: Vec<Attachment>,
    pub contact_info: Option<ContactInfo>,
    pub propagation: PropagationRequest,
}

impl AlertInput {
    /// `now` stamps attachments submitted without an upload time.
    pub fn validate(self, now: DateTime<Utc>) -> AlertResult<NewAlert> {
        let alert_type: AlertType = required_text(self.alert_type, "alertType")?.parse()?;
        let pet_id = self.pet_id.ok_or_else(|| missing("petId"))?;
        let reporter_id = self.reporter_id.ok_or_else(|| missing("reporterId"))?;
        let title = bounded_text(self.title, "title", TITLE_MAX_CHARS)?;
        let description = bounded_text(self.description, "description", DESCRIPTION_MAX_CHARS)?;
        let location = self
            .location
            .ok_or_else(|| missing("location"))?
            .validate("location")?;
        let incident_time = self.incident_time.ok_or_else(|| missing("incidentTime"))?;
        let urgency_level = match self.urgency_level.as_deref() {
            Some(level) => level.parse()?,
            None => UrgencyLevel::default(),
        };

        let attachments = self
            .attachments
            .into_iter()
            .enumerate()
            .map(|(index, attachment)| {
                let url = attachment.url.trim().to_string();
                if url.is_empty() {
                    return Err(missing(&format!("attachments[{}].url", index)));
                }
                Ok(Attachment {
                    attachment_type: attachment.attachment_type.parse()?,
                    url,
                    thumbnail: trimmed(attachment.thumbnail),
                    description: trimmed(attachment.description),
                    uploaded_at: attachment.uploaded_at.unwrap_or(now),
                })
            })
            .collect::<AlertResult<Vec<_>>>()?;

        let contact_info = self.contact_info.map(ContactInfoInput::validate).transpose()?;

        let propagation = self.propagation_settings.unwrap_or_default();
        propagation.validate()?;

        Ok(NewAlert {
            alert_type,
            pet_id,
            reporter_id,
            title,
            description,
            location,
            incident_time,
            urgency_level,
            attachments,
            contact_info,
            propagation,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInput {
    pub response_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub location: Option<LocationInput>,
}

impl ResponseInput {
    pub fn validate(self, user_id: i32, now: DateTime<Utc>) -> AlertResult<ResponseEntry> {
        let response_type = self.response_type.parse()?;
        let location = self
            .location
            .map(|location| location.validate("location"))
            .transpose()?;
        Ok(ResponseEntry {
            user_id,
            response_type,
            message: trimmed(self.message),
            location,
            timestamp: now,
            is_verified: false,
        })
    }
}

fn missing(field: &str) -> AlertError {
    AlertError::validation(format!("{} is required", field))
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_text(value: Option<String>, field: &str) -> AlertResult<String> {
    trimmed(value).ok_or_else(|| missing(field))
}

fn bounded_text(value: Option<String>, field: &str, max_chars: usize) -> AlertResult<String> {
    let text = required_text(value, field)?;
    let len = text.chars().count();
    if len > max_chars {
        return Err(AlertError::validation(format!(
            "{} must be at most {} characters, got {}",
            field, max_chars, len
        )));
    }
    Ok(text)
}
