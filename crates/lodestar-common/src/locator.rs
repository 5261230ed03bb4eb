use serde::{Deserialize, Serialize};
use std::fmt;

/// The query language a [`Locator`] value is written in.
///
/// `Css` and `Xpath` are structural queries. The remaining kinds are the
/// semantic queries produced by the deterministic strategies; drivers map
/// them onto their own accessibility/text lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    Css,
    Xpath,
    Text,
    Role,
    Placeholder,
    Label,
    TestId,
}

impl LocatorKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            LocatorKind::Css => "css",
            LocatorKind::Xpath => "xpath",
            LocatorKind::Text => "text",
            LocatorKind::Role => "role",
            LocatorKind::Placeholder => "placeholder",
            LocatorKind::Label => "label",
            LocatorKind::TestId => "testid",
        }
    }

    /// True for kinds that an AI backend may return (raw selectors).
    pub fn is_structural(&self) -> bool {
        matches!(self, LocatorKind::Css | LocatorKind::Xpath)
    }
}

/// An immutable `(kind, value)` query identifying zero or more elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    kind: LocatorKind,
    value: String,
}

impl Locator {
    pub fn new(kind: LocatorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Css, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Xpath, value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Text, value)
    }

    pub fn role(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Role, value)
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Placeholder, value)
    }

    pub fn label(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::Label, value)
    }

    pub fn test_id(value: impl Into<String>) -> Self {
        Self::new(LocatorKind::TestId, value)
    }

    /// Infer the kind of a raw selector string.
    ///
    /// Selectors beginning with `/` or `(` are XPath, everything else is CSS.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') || trimmed.starts_with('(') {
            Self::xpath(trimmed)
        } else {
            Self::css(trimmed)
        }
    }

    /// Build a structural locator from a selector and an optional declared type
    /// (`"css"` / `"xpath"`). Unknown or missing types fall back to [`Locator::parse`].
    pub fn from_typed(raw: &str, declared: Option<&str>) -> Self {
        match declared.map(|d| d.trim().to_ascii_lowercase()) {
            Some(d) if d == "xpath" => Self::xpath(raw.trim()),
            Some(d) if d == "css" => Self::css(raw.trim()),
            _ => Self::parse(raw),
        }
    }

    pub fn kind(&self) -> LocatorKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind.prefix(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_xpath() {
        assert_eq!(Locator::parse("//button[1]").kind(), LocatorKind::Xpath);
        assert_eq!(
            Locator::parse("(//input)[2]").kind(),
            LocatorKind::Xpath
        );
    }

    #[test]
    fn test_parse_defaults_to_css() {
        let loc = Locator::parse("  #user-input ");
        assert_eq!(loc.kind(), LocatorKind::Css);
        assert_eq!(loc.value(), "#user-input");
    }

    #[test]
    fn test_from_typed_respects_declared_type() {
        assert_eq!(
            Locator::from_typed("button.primary", Some("XPath")).kind(),
            LocatorKind::Xpath
        );
        assert_eq!(
            Locator::from_typed("//a", Some("unknown")).kind(),
            LocatorKind::Xpath
        );
    }

    #[test]
    fn test_display_uses_kind_prefix() {
        assert_eq!(Locator::test_id("login-button").to_string(), "testid=login-button");
        assert_eq!(Locator::css("#a").to_string(), "css=#a");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Locator::test_id("x")).unwrap();
        assert_eq!(json, r#"{"kind":"test_id","value":"x"}"#);
    }
}
