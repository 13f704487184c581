//! The `WorkloadTemplate` and `WorkloadInstance` custom resources.
//!
//! Both structures are immutable inputs to the templating pipeline. Scheme
//! registration and CRD lifecycle management live in the operator binary.
use std::collections::BTreeMap;

use k8s_openapi::api::{core::v1::ServicePort, networking::v1::IngressRule};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A parameterized, possibly multi-document manifest from which workload
/// instances are provisioned.
#[derive(Clone, CustomResource, Debug, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "provisioning.stackable.tech",
    version = "v1alpha1",
    kind = "WorkloadTemplate",
    plural = "workloadtemplates"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTemplateSpec {
    /// Human readable description of what the template provisions.
    #[serde(default)]
    pub description: String,

    /// The variables the manifest text references. Every custom variable used
    /// in `manifest` should be declared here, optionally with a default.
    #[serde(default)]
    pub parameters: Vec<TemplateParameter>,

    /// The raw manifest text. Documents are separated by `---` lines and may
    /// reference variables with the `{{NAME}}` token syntax.
    pub manifest: String,
}

/// A single declared template variable.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameter {
    pub name: String,

    /// Value used when the instance does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// A concrete deployment request: one template reference plus variable values
/// and per-resource overrides. An instance without a namespace is
/// cluster-scoped.
#[derive(Clone, CustomResource, Debug, Deserialize, JsonSchema, Serialize)]
#[kube(
    group = "provisioning.stackable.tech",
    version = "v1alpha1",
    kind = "WorkloadInstance",
    plural = "workloadinstances",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInstanceSpec {
    /// Name of the [`WorkloadTemplate`] this instance is built from.
    pub template: String,

    /// Values for the custom variables declared by the template.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    #[serde(default)]
    pub overrides: Overrides,
}

/// Optional customization of the built documents. Override targets that match
/// no document are skipped, they are not errors.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Replica-count overrides.
    #[serde(default)]
    pub scale: Vec<ScaleOverride>,

    /// Ingress rule and service port overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkOverrides>,

    /// RFC 6902 JSON patches, applied in list order.
    #[serde(default)]
    pub json_patches: Vec<JsonPatchOverride>,
}

/// Selects one built document by type and name.
///
/// The name may be given in logical (unprefixed) or prefixed form, both match
/// the same document. The namespace only participates in matching when set.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Sets `spec.replicas` on the targeted document.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleOverride {
    pub target: TargetRef,
    pub replicas: i32,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkOverrides {
    #[serde(default)]
    pub ingress: Vec<IngressOverride>,

    #[serde(default)]
    pub service: Vec<ServiceOverride>,
}

/// Merges annotations and rules into the Ingress with the given target name.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressOverride {
    /// Logical (unprefixed) name of the Ingress to customize.
    pub target_name: String,

    /// Merged into the Ingress annotations, override values win on collision.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Merged into the Ingress rules host by host, path by path.
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

/// Replaces or appends ports on the Service with the given target name.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverride {
    /// Logical (unprefixed) name of the Service to customize.
    pub target_name: String,

    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

/// An RFC 6902 patch against the targeted document.
#[derive(Clone, Debug, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonPatchOverride {
    pub target: TargetRef,

    /// A JSON array of RFC 6902 operations, as text.
    pub patch: String,
}
