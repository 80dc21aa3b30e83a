use serde_json::Value;

/// A normalized external-provider profile, as handed to the reconciler.
///
/// `data` is the provider's payload kept opaque; `identifier_field` names the
/// key inside it that uniquely identifies the user at that provider.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub provider: String,
    pub identifier_field: String,
    pub data: Value,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub username_hint: Option<String>,
}

impl ProviderProfile {
    /// The provider-unique identifier value, as text.
    ///
    /// Numeric identifiers (GitHub's `id`) are stringified so they compare
    /// against the store's text extraction of the JSON column.
    pub fn identifier(&self) -> Option<String> {
        match self.data.get(&self.identifier_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The base username for a newly created account: the provider's handle
    /// when it supplies one, otherwise the email's local part, otherwise
    /// empty.
    pub fn username_candidate(&self) -> String {
        if let Some(hint) = self.username_hint.as_deref() {
            if !hint.is_empty() {
                return hint.to_lowercase();
            }
        }

        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .unwrap_or_default()
            .to_lowercase()
    }
}
