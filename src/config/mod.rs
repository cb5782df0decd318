#[cfg(feature = "cli")]
pub mod cli;
pub mod commands;
pub mod inventory;

use crate::utils::error::Result;
use regex::Regex;

/// Replaces `${VAR}` with the value of the environment variable `VAR`.
///
/// Unset variables are left untouched.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}")?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("ANTA_TEST_SUBST", "value");
        let out = substitute_env_vars("a = \"${ANTA_TEST_SUBST}\"\nb = \"${ANTA_TEST_UNSET_VAR}\"").unwrap();
        assert_eq!(out, "a = \"value\"\nb = \"${ANTA_TEST_UNSET_VAR}\"");
    }
}
