use std::fmt;
use std::io::Error;

/// Name of the environment variable which contains the environment name.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

/// The name of the sandbox environment.
const SANDBOX_ENV_NAME: &str = "sandbox";

/// The name of the production environment.
const PRODUCTION_ENV_NAME: &str = "production";

/// Represents the remote accounting environment the engine talks to.
///
/// The environment selects the base host of the remote API: [`Environment::Sandbox`]
/// targets the sandbox company, [`Environment::Production`] the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Sandbox environment backed by a test company.
    Sandbox,
    /// Production environment backed by the connected live company.
    Production,
}

impl Environment {
    /// Loads the environment from the `APP_ENVIRONMENT` env variable.
    ///
    /// Defaults to [`Environment::Sandbox`] when the variable is unset.
    pub fn load() -> Result<Environment, Error> {
        std::env::var(APP_ENVIRONMENT_ENV_NAME)
            .unwrap_or_else(|_| SANDBOX_ENV_NAME.into())
            .try_into()
    }

    /// Returns the string name of the environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_ENV_NAME,
            Environment::Production => PRODUCTION_ENV_NAME,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    /// Attempts to create an [`Environment`] from a string, case-insensitively.
    ///
    /// Accepts "sandbox" or "production". Returns an error if the input does not
    /// match a supported environment.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            SANDBOX_ENV_NAME => Ok(Self::Sandbox),
            PRODUCTION_ENV_NAME => Ok(Self::Production),
            other => Err(Error::other(format!(
                "{other} is not a supported environment. Use either `{SANDBOX_ENV_NAME}` or `{PRODUCTION_ENV_NAME}`.",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_environments_case_insensitively() {
        let sandbox: Environment = "Sandbox".to_string().try_into().unwrap();
        assert_eq!(sandbox, Environment::Sandbox);

        let production: Environment = "PRODUCTION".to_string().try_into().unwrap();
        assert_eq!(production, Environment::Production);
    }

    #[test]
    fn rejects_unknown_environment() {
        let result: Result<Environment, _> = "staging".to_string().try_into();
        assert!(result.is_err());
    }
}
