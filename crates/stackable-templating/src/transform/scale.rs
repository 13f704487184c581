//! Replica-count overrides.
use kube::{ResourceExt, core::DynamicObject};
use tracing::debug;

use super::{DocumentTransform, Result, target_matches};
use crate::crd::{ScaleOverride, WorkloadInstance};

/// Sets `spec.replicas` on documents targeted by a scale override.
///
/// Targets that match no document are skipped. Documents without a
/// structured `spec` cannot be scaled and are left untouched.
pub struct ScalingTransformer {
    instance_name: String,
    overrides: Vec<ScaleOverride>,
}

impl ScalingTransformer {
    pub fn new(instance: &WorkloadInstance) -> Self {
        Self {
            instance_name: instance.name_any(),
            overrides: instance.spec.overrides.scale.clone(),
        }
    }
}

impl DocumentTransform for ScalingTransformer {
    fn transform(&self, document: &DynamicObject) -> Result<DynamicObject> {
        let mut document = document.clone();
        let matching: Vec<&ScaleOverride> = self
            .overrides
            .iter()
            .filter(|scale| target_matches(&scale.target, &self.instance_name, &document))
            .collect();
        for scale in matching {
            if let Some(serde_json::Value::Object(spec)) = document.data.get_mut("spec") {
                spec.insert("replicas".to_owned(), scale.replicas.into());
                debug!(
                    name = %document.name_any(),
                    replicas = scale.replicas,
                    "applied scale override"
                );
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{crd::TargetRef, document};

    fn transformer(target_kind: &str, target_name: &str, replicas: i32) -> ScalingTransformer {
        ScalingTransformer {
            instance_name: "cs1".to_owned(),
            overrides: vec![ScaleOverride {
                target: TargetRef {
                    api_version: "apps/v1".to_owned(),
                    kind: target_kind.to_owned(),
                    name: target_name.to_owned(),
                    namespace: None,
                },
                replicas,
            }],
        }
    }

    fn deployment() -> DynamicObject {
        document::parse(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: cs1-test-deployment
            spec:
              replicas: 3
        "})
        .expect("test document is valid")
        .1
    }

    #[test]
    fn sets_replicas_on_matching_document() {
        let out = transformer("Deployment", "test-deployment", 0)
            .transform(&deployment())
            .expect("transform works");
        assert_eq!(
            out.data.pointer("/spec/replicas"),
            Some(&serde_json::Value::from(0))
        );
    }

    #[test]
    fn different_kind_is_left_unchanged() {
        let out = transformer("StatefulSet", "test-deployment", 0)
            .transform(&deployment())
            .expect("transform works");
        assert_eq!(
            out.data.pointer("/spec/replicas"),
            Some(&serde_json::Value::from(3))
        );
    }

    #[test]
    fn different_name_is_left_unchanged() {
        let out = transformer("Deployment", "other-deployment", 0)
            .transform(&deployment())
            .expect("transform works");
        assert_eq!(
            out.data.pointer("/spec/replicas"),
            Some(&serde_json::Value::from(3))
        );
    }

    #[test]
    fn document_without_spec_is_left_unchanged() {
        let document = document::parse(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: cs1-test-deployment
        "})
        .expect("test document is valid")
        .1;

        let out = transformer("Deployment", "test-deployment", 0)
            .transform(&document)
            .expect("transform works");
        assert_eq!(out.data.pointer("/spec"), None);
    }
}
