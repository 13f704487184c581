//! RFC 6902 JSON patch application.
use kube::{ResourceExt, core::DynamicObject};
use snafu::ResultExt;
use tracing::debug;

use super::{
    ApplyJsonPatchSnafu, DecodeJsonPatchSnafu, DocumentTransform, EncodeDocumentSnafu,
    ReparsePatchedDocumentSnafu, Result, target_matches,
};
use crate::crd::{JsonPatchOverride, WorkloadInstance};

/// Applies the instance's JSON patches to the documents they target.
///
/// Patches for the same document are applied in list order, each operating
/// on the output of the previous one. A patch that does not decode, does not
/// apply, or leaves behind something that is no longer a valid object aborts
/// the document's remaining patches and surfaces the error.
pub struct JsonPatchTransformer {
    instance_name: String,
    overrides: Vec<JsonPatchOverride>,
}

impl JsonPatchTransformer {
    pub fn new(instance: &WorkloadInstance) -> Self {
        Self {
            instance_name: instance.name_any(),
            overrides: instance.spec.overrides.json_patches.clone(),
        }
    }
}

impl DocumentTransform for JsonPatchTransformer {
    fn transform(&self, document: &DynamicObject) -> Result<DynamicObject> {
        let matching: Vec<&JsonPatchOverride> = self
            .overrides
            .iter()
            .filter(|entry| target_matches(&entry.target, &self.instance_name, document))
            .collect();
        if matching.is_empty() {
            return Ok(document.clone());
        }

        let name = document.name_any();
        let mut value =
            serde_json::to_value(document).context(EncodeDocumentSnafu { name: &name })?;
        for entry in matching {
            let patch: json_patch::Patch =
                serde_json::from_str(&entry.patch).context(DecodeJsonPatchSnafu {
                    patch: &entry.patch,
                    name: &name,
                })?;
            json_patch::patch(&mut value, &patch)
                .context(ApplyJsonPatchSnafu { name: &name })?;
            debug!(%name, "applied JSON patch");
        }

        serde_json::from_value(value).context(ReparsePatchedDocumentSnafu { name })
    }
}
