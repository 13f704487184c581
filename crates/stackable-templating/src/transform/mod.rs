//! Document transformations applied to freshly built manifest documents.
//!
//! A transformer is a pure function over one document: it clones its input,
//! never mutates it in place, and is independent of every other document's
//! transform. The set of transformers applied to one document is ordered,
//! [`builtin_transformers`] assembles the canonical chain.
use kube::{ResourceExt, core::DynamicObject};
use snafu::Snafu;

mod metadata;
mod network;
mod patch;
mod scale;

pub use metadata::{INSTANCE_LABEL_KEY, MetadataTransformer, TEMPLATE_LABEL_KEY};
pub use network::NetworkTransformer;
pub use patch::JsonPatchTransformer;
pub use scale::ScalingTransformer;

use crate::{
    crd::{TargetRef, WorkloadInstance, WorkloadTemplate},
    names,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("document has no object name"))]
    MissingObjectName,

    #[snafu(display("instance has no {key}, cannot build an owner reference"))]
    MissingInstanceKey { key: &'static str },

    #[snafu(display("{kind} {name:?} is already controlled by {owner_kind} {owner_name:?}"))]
    OwnershipConflict {
        kind: String,
        name: String,
        owner_kind: String,
        owner_name: String,
    },

    #[snafu(display("failed to parse {kind} {name:?} for override merging"))]
    ParseOverrideTarget {
        source: kube::core::dynamic::ParseDynamicObjectError,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to re-encode {kind} {name:?} after override merging"))]
    ReencodeOverrideTarget {
        source: serde_json::Error,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to encode document {name:?} for patching"))]
    EncodeDocument {
        source: serde_json::Error,
        name: String,
    },

    #[snafu(display("failed to decode JSON patch {patch:?} targeting {name:?}"))]
    DecodeJsonPatch {
        source: serde_json::Error,
        patch: String,
        name: String,
    },

    #[snafu(display("failed to apply JSON patch to {name:?}"))]
    ApplyJsonPatch {
        source: json_patch::PatchError,
        name: String,
    },

    #[snafu(display("document {name:?} is no longer a valid object after patching"))]
    ReparsePatchedDocument {
        source: serde_json::Error,
        name: String,
    },
}

/// A single document transformation.
///
/// Implementations operate on a fresh copy of the input and must be safe to
/// invoke independently per document. `apiVersion` and `kind` are never
/// changed, only `metadata` and `spec`-level fields.
pub trait DocumentTransform {
    fn transform(&self, document: &DynamicObject) -> Result<DynamicObject>;
}

/// Applies `transformers` in order to every document.
///
/// Each transformer receives the previous transformer's output for that
/// document. The first error aborts the whole build, no documents are
/// returned past that point.
pub fn apply_all(
    transformers: &[Box<dyn DocumentTransform>],
    documents: &[DynamicObject],
) -> Result<Vec<DynamicObject>> {
    documents
        .iter()
        .map(|document| {
            transformers
                .iter()
                .try_fold(document.clone(), |document, transformer| {
                    transformer.transform(&document)
                })
        })
        .collect()
}

/// Assembles the canonical transformer chain for one build.
///
/// Metadata runs first: the later transformers match override targets
/// against documents that already belong to the instance and read the
/// instance namespace off them.
pub fn builtin_transformers(
    template: &WorkloadTemplate,
    instance: &WorkloadInstance,
) -> Vec<Box<dyn DocumentTransform>> {
    vec![
        Box::new(MetadataTransformer::new(instance, template)),
        Box::new(NetworkTransformer::new(instance)),
        Box::new(ScalingTransformer::new(instance)),
        Box::new(JsonPatchTransformer::new(instance)),
    ]
}

/// Whether `target` selects `document`.
///
/// The apiVersion and kind must match exactly, the names are compared under
/// the instance prefix so logical target names match prefixed document
/// names. A namespace on the target only participates when set.
pub(crate) fn target_matches(
    target: &TargetRef,
    instance_name: &str,
    document: &DynamicObject,
) -> bool {
    let Some(types) = &document.types else {
        return false;
    };
    if types.api_version != target.api_version || types.kind != target.kind {
        return false;
    }
    if let Some(namespace) = &target.namespace {
        if document.metadata.namespace.as_ref() != Some(namespace) {
            return false;
        }
    }
    names::names_equivalent(instance_name, &target.name, &document.name_any())
}
