use thiserror::Error;

#[derive(Error, Debug)]
pub enum PopupCamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Actuator error: {0}")]
    Actuator(#[from] ActuatorError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl PopupCamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by the motor driver interface
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Motor call failed: {details}")]
    Transient { details: String },

    #[error("Motor service not available")]
    Unavailable,

    #[error("Unknown motor status code: {code}")]
    UnknownStatus { code: i32 },
}

impl ActuatorError {
    pub fn transient<S: Into<String>>(details: S) -> Self {
        Self::Transient {
            details: details.into(),
        }
    }

    /// Transient failures never reach the user; the controller logs them and moves on.
    pub fn is_transient(&self) -> bool {
        matches!(self, ActuatorError::Transient { .. })
    }
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, PopupCamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ActuatorError::transient("binder died").is_transient());
        assert!(!ActuatorError::Unavailable.is_transient());
        assert!(!ActuatorError::UnknownStatus { code: 42 }.is_transient());
    }

    #[test]
    fn test_error_conversion() {
        let err: PopupCamError = ActuatorError::Unavailable.into();
        assert!(matches!(err, PopupCamError::Actuator(ActuatorError::Unavailable)));
        assert_eq!(err.to_string(), "Actuator error: Motor service not available");
    }
}
