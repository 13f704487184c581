//! Naming, namespacing, labeling and ownership of built documents.
use std::collections::BTreeMap;

use const_format::concatcp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt, core::DynamicObject};
use snafu::OptionExt;
use tracing::debug;

use super::{
    DocumentTransform, MissingInstanceKeySnafu, MissingObjectNameSnafu, OwnershipConflictSnafu,
    Result,
};
use crate::{
    crd::{WorkloadInstance, WorkloadTemplate},
    names,
};

/// The well-known Kubernetes app key prefix.
const K8S_APP_KEY_PREFIX: &str = "app.kubernetes.io/";

/// The provisioning-specific key prefix.
const PROVISIONING_KEY_PREFIX: &str = "provisioning.stackable.tech/";

/// Labels every built document with the name of the owning instance.
pub const INSTANCE_LABEL_KEY: &str = concatcp!(K8S_APP_KEY_PREFIX, "instance");

/// Labels every built document with the name of the template it came from.
pub const TEMPLATE_LABEL_KEY: &str = concatcp!(PROVISIONING_KEY_PREFIX, "template");

/// Establishes instance ownership over a document.
///
/// The document is renamed under the instance prefix, moved into the
/// instance namespace, labeled with the instance and template names and
/// given a controller owner reference pointing at the instance. A document
/// that is already controlled by a different owner is a hard error: two
/// instances must not silently share one resource.
pub struct MetadataTransformer {
    instance: WorkloadInstance,
    template_name: String,
}

impl MetadataTransformer {
    pub fn new(instance: &WorkloadInstance, template: &WorkloadTemplate) -> Self {
        Self {
            instance: instance.clone(),
            template_name: template.name_any(),
        }
    }

    fn owner_reference(&self) -> Result<OwnerReference> {
        Ok(OwnerReference {
            api_version: WorkloadInstance::api_version(&()).into_owned(),
            kind: WorkloadInstance::kind(&()).into_owned(),
            name: self.instance.name_any(),
            uid: self
                .instance
                .uid()
                .context(MissingInstanceKeySnafu { key: "uid" })?,
            controller: Some(true),
            block_owner_deletion: Some(true),
        })
    }
}

impl DocumentTransform for MetadataTransformer {
    fn transform(&self, document: &DynamicObject) -> Result<DynamicObject> {
        let mut document = document.clone();
        let instance_name = self.instance.name_any();

        let local_name = document
            .metadata
            .name
            .take()
            .context(MissingObjectNameSnafu)?;
        let name = names::resource_name(&instance_name, &local_name);
        document.metadata.name = Some(name.clone());
        document.metadata.namespace = self.instance.namespace();

        let labels = document.metadata.labels.get_or_insert_with(BTreeMap::new);
        labels.insert(INSTANCE_LABEL_KEY.to_owned(), instance_name.clone());
        labels.insert(TEMPLATE_LABEL_KEY.to_owned(), self.template_name.clone());

        let kind = document
            .types
            .as_ref()
            .map(|types| types.kind.clone())
            .unwrap_or_default();
        let owner = self.owner_reference()?;
        let owner_references = document.metadata.owner_references.get_or_insert_with(Vec::new);
        match owner_references
            .iter_mut()
            .find(|reference| reference.controller == Some(true))
        {
            // re-running against the same owner must stay a no-op
            Some(existing) if same_owner(existing, &owner) => *existing = owner,
            Some(existing) => {
                return OwnershipConflictSnafu {
                    kind,
                    name,
                    owner_kind: existing.kind.clone(),
                    owner_name: existing.name.clone(),
                }
                .fail();
            }
            None => owner_references.push(owner),
        }

        debug!(%kind, %name, instance = %instance_name, "claimed document");
        Ok(document)
    }
}

/// Two references point at the same owner iff the whole identity tuple
/// (apiVersion, kind, name, uid) matches.
fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.api_version == b.api_version && a.kind == b.kind && a.name == b.name && a.uid == b.uid
}
