//! Variable substitution over raw manifest text.
//!
//! Substitution is plain whole-text string replacement and runs before any
//! document is parsed. It has no awareness of document boundaries or YAML
//! quoting. Two passes are made over the text, always in the same order:
//! first the default variables derived from the instance, then the custom
//! variables supplied by the instance. A custom value that happens to equal a
//! default token is therefore never substituted again.
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use const_format::concatcp;
use kube::ResourceExt;
use regex::Regex;

use crate::crd::{WorkloadInstance, WorkloadTemplate};

/// Opening delimiter of a variable token.
pub const VAR_OPEN: &str = "{{";
/// Closing delimiter of a variable token.
pub const VAR_CLOSE: &str = "}}";

/// Replaced with the instance name.
pub const INSTANCE_VAR: &str = concatcp!(VAR_OPEN, "INSTANCE", VAR_CLOSE);
/// Replaced with the name of the referenced template.
pub const TEMPLATE_VAR: &str = concatcp!(VAR_OPEN, "TEMPLATE", VAR_CLOSE);
/// Replaced with the instance namespace, only for namespaced instances.
pub const NAMESPACE_VAR: &str = concatcp!(VAR_OPEN, "NAMESPACE", VAR_CLOSE);

static VAR_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("failed to compile variable token regex")
});

/// Substitutes the default variables for `instance` into `text`.
///
/// `{{NAMESPACE}}` is left untouched for cluster-scoped instances, a
/// template using it is expected to be instantiated into a namespace.
pub fn substitute_defaults(text: &str, instance: &WorkloadInstance) -> String {
    let mut out = text.replace(INSTANCE_VAR, &instance.name_any());
    out = out.replace(TEMPLATE_VAR, &instance.spec.template);
    if let Some(namespace) = instance.namespace() {
        out = out.replace(NAMESPACE_VAR, &namespace);
    }
    out
}

/// Normalizes a variable key into its token form.
///
/// The opening and closing delimiters are patched independently: each is
/// only added when the key does not already carry it. No further validation
/// is performed, a partially bracketed key produces a partially doubled
/// token (`{INSTA{{NCE}}}` becomes `{{{INSTA{{NCE}}}`).
pub fn braced(key: &str) -> String {
    let mut token = String::with_capacity(VAR_OPEN.len() + key.len() + VAR_CLOSE.len());
    if !key.starts_with(VAR_OPEN) {
        token.push_str(VAR_OPEN);
    }
    token.push_str(key);
    if !key.ends_with(VAR_CLOSE) {
        token.push_str(VAR_CLOSE);
    }
    token
}

/// Substitutes every custom variable into `text`.
///
/// Keys are normalized with [`braced`] and replaced in map order, which is
/// deterministic for a [`BTreeMap`].
pub fn substitute_vars(text: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = text.to_owned();
    for (key, value) in vars {
        out = out.replace(&braced(key), value);
    }
    out
}

/// Resolves the effective custom variable values for one build.
///
/// Template parameter defaults are overlaid with the values supplied by the
/// instance, the instance wins. Parameters without a default and without a
/// supplied value are absent from the result (a separate validation layer
/// rejects such instances before a build is attempted).
pub fn resolve_vars(
    template: &WorkloadTemplate,
    instance: &WorkloadInstance,
) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for parameter in &template.spec.parameters {
        if let Some(default) = &parameter.default {
            vars.insert(parameter.name.clone(), default.clone());
        }
    }
    vars.extend(
        instance
            .spec
            .vars
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    vars
}

/// Returns the names of all well-formed `{{NAME}}` tokens in `text`.
pub fn referenced_variables(text: &str) -> BTreeSet<String> {
    VAR_TOKEN_REGEX
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_owned())
        .collect()
}
