pub mod emergency_alert;

pub use emergency_alert::Entity as EmergencyAlerts;
