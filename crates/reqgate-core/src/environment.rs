use serde::{Deserialize, Serialize};

/// Deployment environment. Controls how much error detail reaches callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Dev,
    Staging,
    Prod,
}

impl Environment {
    /// Lenient parse for environment-style config; `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Some(Environment::Dev),
            "staging" => Some(Environment::Staging),
            "prod" => Some(Environment::Prod),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Staging => "staging",
            Environment::Prod => "prod",
        }
    }

    pub fn is_prod(self) -> bool {
        matches!(self, Environment::Prod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(Environment::parse(" PROD "), Some(Environment::Prod));
        assert_eq!(Environment::parse("staging"), Some(Environment::Staging));
        assert_eq!(Environment::parse("qa"), None);
        assert_eq!(Environment::default(), Environment::Dev);
    }
}
