//! Email addresses as stored on items and rendered into hit records.

/// A parsed email address.
///
/// Serialized as its display form, so a mailbox file can write
/// `"Alice Example <alice@example.com>"` directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single address: `user@domain`, `<user@domain>`,
    /// `Display Name <user@domain>` or `"Quoted, Name" <user@domain>`.
    ///
    /// Anything else is kept verbatim as the address.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let (Some(open), Some(close)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if close > open {
                return Self {
                    display_name: strip_quotes(&trimmed[..open]),
                    address: trimmed[open + 1..close].trim().to_string(),
                };
            }
        }
        Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        }
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }

    /// Display name if present, else the address.
    pub fn personal(&self) -> &str {
        if self.display_name.is_empty() {
            &self.address
        } else {
            &self.display_name
        }
    }

    /// Key used for sender ordering and sender range comparisons.
    pub fn sort_key(&self) -> String {
        self.address.to_lowercase()
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

impl From<String> for EmailAddress {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<EmailAddress> for String {
    fn from(addr: EmailAddress) -> Self {
        addr.display()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr.address, "user@example.com");
        assert_eq!(addr.display_name, "");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <User1@Example.com>");
        assert_eq!(addr.address, "User1@Example.com");
        assert_eq!(addr.display_name, "User One");
        assert_eq!(addr.sort_key(), "user1@example.com");
    }

    #[test]
    fn test_parse_quoted_name() {
        let addr = EmailAddress::parse("\"Last, First\" <user@example.com>");
        assert_eq!(addr.display_name, "Last, First");
        assert_eq!(addr.personal(), "Last, First");
    }

    #[test]
    fn test_serde_uses_display_form() {
        let addr: EmailAddress = serde_json::from_str("\"Alice <alice@x.com>\"").unwrap();
        assert_eq!(addr.address, "alice@x.com");
        assert_eq!(
            serde_json::to_string(&addr).unwrap(),
            "\"Alice <alice@x.com>\""
        );
    }
}
