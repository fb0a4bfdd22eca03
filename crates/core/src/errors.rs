use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown toolbox action `{0}`")]
    UnknownToolboxAction(String),
    #[error("slot `{slot}` rejected: {reason}")]
    InvalidSlotValue { slot: String, reason: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("language model failure: {0}")]
    Llm(String),
    #[error("match store failure: {0}")]
    Store(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Message safe to hand to the chat surface. Detail stays in logs keyed
    /// by the correlation id.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "I couldn't work with that request. Could you rephrase it?"
            }
            Self::ServiceUnavailable { .. } => {
                "The matchmaking service is temporarily unavailable. Please try again shortly."
            }
            Self::Internal { .. } => "Something went wrong on our side. Please try again.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(_) => Self::BadRequest {
                message: "domain validation failed".to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Llm(message)
            | ApplicationError::Store(message)
            | ApplicationError::Persistence(message) => Self::ServiceUnavailable {
                message,
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn domain_error_maps_to_bad_request_with_correlation_id() {
        let interface = ApplicationError::from(DomainError::UnknownToolboxAction(
            "launchRocket".to_owned(),
        ))
        .into_interface("turn-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "turn-1"
        ));
    }

    #[test]
    fn llm_and_store_failures_map_to_service_unavailable() {
        for error in [
            ApplicationError::Llm("model endpoint 503".to_owned()),
            ApplicationError::Store("query timeout".to_owned()),
            ApplicationError::Persistence("sqlite lock".to_owned()),
        ] {
            let interface = error.into_interface("turn-2");
            assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
            assert_eq!(
                interface.user_message(),
                "The matchmaking service is temporarily unavailable. Please try again shortly."
            );
        }
    }

    #[test]
    fn configuration_error_maps_to_internal() {
        let interface =
            ApplicationError::Configuration("missing llm api key".to_owned()).into_interface("t");
        assert!(matches!(interface, InterfaceError::Internal { .. }));
    }
}
