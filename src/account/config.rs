//! Tunables for the account service.

/// Account service configuration with conventional defaults: 6-digit codes
/// valid for 2 hours.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    code_digits: u32,
    code_ttl_hours: i64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            code_digits: 6,
            code_ttl_hours: 2,
        }
    }
}

impl AccountConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_code_digits(mut self, digits: u32) -> Self {
        self.code_digits = digits;
        self
    }

    #[must_use]
    pub fn with_code_ttl_hours(mut self, hours: i64) -> Self {
        self.code_ttl_hours = hours;
        self
    }

    #[must_use]
    pub fn code_digits(&self) -> u32 {
        self.code_digits
    }

    #[must_use]
    pub fn code_ttl_hours(&self) -> i64 {
        self.code_ttl_hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AccountConfig::new();
        assert_eq!(config.code_digits(), 6);
        assert_eq!(config.code_ttl_hours(), 2);
    }

    #[test]
    fn builder_overrides_stick() {
        let config = AccountConfig::new().with_code_digits(8).with_code_ttl_hours(1);
        assert_eq!(config.code_digits(), 8);
        assert_eq!(config.code_ttl_hours(), 1);
    }
}
