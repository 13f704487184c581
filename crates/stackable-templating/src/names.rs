//! Instance-scoped resource naming.
//!
//! Every resource built for an instance carries the instance name as a
//! physical name prefix. Prefixing is idempotent so documents can pass
//! through the pipeline more than once, and override targets may name
//! resources in either logical or prefixed form.

/// Returns the physical name of a resource owned by `owner`.
///
/// `local` is returned unchanged if it already starts with `owner` followed
/// by a hyphen, otherwise the prefix is prepended. Applying this twice yields
/// the same result as applying it once.
pub fn resource_name(owner: &str, local: &str) -> String {
    match local.strip_prefix(owner) {
        Some(rest) if rest.starts_with('-') => local.to_owned(),
        _ => format!("{owner}-{local}"),
    }
}

/// Compares two resource names under the `owner` prefix.
///
/// Both names are prefixed before comparison, so a logical override target
/// name matches the already-prefixed name of a built document.
pub fn names_equivalent(owner: &str, a: &str, b: &str) -> bool {
    resource_name(owner, a) == resource_name(owner, b)
}
