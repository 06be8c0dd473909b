use crate::FirebaseApp;

/// Behavior switches for the providers.
#[derive(Clone, Default)]
pub struct ProviderOptions {
    /// Document path prefixed to every resource, e.g. `"tenants/acme"`.
    /// Resources stay keyed by their relative name; only the backend paths
    /// move under the prefix.
    pub root_ref: Option<String>,
    /// Stamp `createdby`/`updatedby` with the user id instead of the email.
    pub associate_users_by_id: bool,
    /// Reuse an existing app (and its login session) instead of creating
    /// one. Sharing an app between the data and auth providers makes a
    /// logout on one visible to the other.
    pub app: Option<FirebaseApp>,
}

/// Joins the optional root prefix and a relative resource path.
pub(crate) fn absolute_path(root_ref: Option<&str>, relative_path: &str) -> String {
    match root_ref {
        Some(root) if !root.is_empty() => format!(
            "{}/{}",
            root.trim_matches('/'),
            relative_path.trim_start_matches('/')
        ),
        _ => relative_path.trim_start_matches('/').to_string(),
    }
}
