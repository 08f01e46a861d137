//! Model string resolution

use thiserror::Error;

/// Requested model value that asks for the configured default
pub const AUTO_MODEL: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("No model requested and no default_model configured")]
    NoDefault,
}

/// Turns a caller-supplied model request into the identifier passed to the agent CLI.
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, requested: &str) -> Result<String, ModelError>;
}

/// Returns the request unchanged; an empty request or `"auto"` takes the default.
#[derive(Debug, Clone, Default)]
pub struct PassthroughModelResolver {
    default_model: Option<String>,
}

impl PassthroughModelResolver {
    pub fn new(default_model: Option<String>) -> Self {
        Self {
            default_model: default_model.filter(|m| !m.trim().is_empty()),
        }
    }
}

impl ModelResolver for PassthroughModelResolver {
    fn resolve(&self, requested: &str) -> Result<String, ModelError> {
        let requested = requested.trim();
        if requested.is_empty() || requested.eq_ignore_ascii_case(AUTO_MODEL) {
            return self.default_model.clone().ok_or(ModelError::NoDefault);
        }
        Ok(requested.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_keeps_explicit_model() {
        let resolver = PassthroughModelResolver::new(Some("openai/gpt-5".to_string()));
        assert_eq!(
            resolver.resolve("moonshot-ai/kimi-k2.5").unwrap(),
            "moonshot-ai/kimi-k2.5"
        );
        assert_eq!(resolver.resolve("some-unknown-model").unwrap(), "some-unknown-model");
    }

    #[test]
    fn test_auto_and_empty_use_default() {
        let resolver = PassthroughModelResolver::new(Some("openai/gpt-5".to_string()));
        assert_eq!(resolver.resolve("auto").unwrap(), "openai/gpt-5");
        assert_eq!(resolver.resolve("").unwrap(), "openai/gpt-5");
        assert_eq!(resolver.resolve("  ").unwrap(), "openai/gpt-5");
    }

    #[test]
    fn test_auto_without_default_fails() {
        let resolver = PassthroughModelResolver::new(Some(String::new()));
        assert_eq!(resolver.resolve("auto"), Err(ModelError::NoDefault));
    }
}
