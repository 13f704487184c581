//! Ingress rule and service port override merging.
use std::collections::BTreeMap;

use k8s_openapi::api::{
    core::v1::{Service, ServiceSpec},
    networking::v1::{HTTPIngressRuleValue, Ingress, IngressRule, IngressSpec},
};
use kube::{Resource, ResourceExt, core::DynamicObject};
use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use tracing::debug;

use super::{DocumentTransform, ParseOverrideTargetSnafu, ReencodeOverrideTargetSnafu, Result};
use crate::{
    crd::{IngressOverride, NetworkOverrides, ServiceOverride, WorkloadInstance},
    names,
};

/// Merges instance-level network overrides into matching documents.
///
/// Documents other than Ingresses and Services, and targets that match no
/// document, pass through untouched. Overrides are best-effort customization
/// of resources that may or may not be present in a template revision.
pub struct NetworkTransformer {
    instance_name: String,
    overrides: Option<NetworkOverrides>,
}

impl NetworkTransformer {
    pub fn new(instance: &WorkloadInstance) -> Self {
        Self {
            instance_name: instance.name_any(),
            overrides: instance.spec.overrides.network.clone(),
        }
    }

    fn targets_document(&self, target_name: &str, document: &DynamicObject) -> bool {
        names::names_equivalent(&self.instance_name, target_name, &document.name_any())
    }

    fn merge_into_ingress(
        &self,
        overrides: &[IngressOverride],
        document: &DynamicObject,
    ) -> Result<DynamicObject> {
        let matching: Vec<&IngressOverride> = overrides
            .iter()
            .filter(|o| self.targets_document(&o.target_name, document))
            .collect();
        if matching.is_empty() {
            return Ok(document.clone());
        }

        let mut ingress: Ingress = parse_as(document)?;
        for o in matching {
            merge_ingress(&mut ingress, o);
        }

        // not meaningful on a template
        ingress.status = None;
        ingress.metadata.creation_timestamp = None;

        debug!(name = %document.name_any(), "merged ingress overrides");
        reencode(&ingress, document)
    }

    fn merge_into_service(
        &self,
        overrides: &[ServiceOverride],
        document: &DynamicObject,
    ) -> Result<DynamicObject> {
        let matching: Vec<&ServiceOverride> = overrides
            .iter()
            .filter(|o| self.targets_document(&o.target_name, document))
            .collect();
        if matching.is_empty() {
            return Ok(document.clone());
        }

        let mut service: Service = parse_as(document)?;
        for o in matching {
            merge_service(&mut service, o);
        }

        debug!(name = %document.name_any(), "merged service overrides");
        reencode(&service, document)
    }
}

impl DocumentTransform for NetworkTransformer {
    fn transform(&self, document: &DynamicObject) -> Result<DynamicObject> {
        let Some(overrides) = &self.overrides else {
            return Ok(document.clone());
        };

        if is_a::<Ingress>(document) {
            self.merge_into_ingress(&overrides.ingress, document)
        } else if is_a::<Service>(document) {
            self.merge_into_service(&overrides.service, document)
        } else {
            Ok(document.clone())
        }
    }
}

fn is_a<R>(document: &DynamicObject) -> bool
where
    R: Resource<DynamicType = ()>,
{
    document.types.as_ref().is_some_and(|types| {
        types.api_version == R::api_version(&()) && types.kind == R::kind(&())
    })
}

fn parse_as<R>(document: &DynamicObject) -> Result<R>
where
    R: Resource<DynamicType = ()> + DeserializeOwned,
{
    document
        .clone()
        .try_parse()
        .with_context(|_| ParseOverrideTargetSnafu {
            kind: R::kind(&()).into_owned(),
            name: document.name_any(),
        })
}

fn reencode<R>(resource: &R, document: &DynamicObject) -> Result<DynamicObject>
where
    R: Resource<DynamicType = ()> + Serialize,
{
    serde_json::to_value(resource)
        .and_then(serde_json::from_value)
        .with_context(|_| ReencodeOverrideTargetSnafu {
            kind: R::kind(&()).into_owned(),
            name: document.name_any(),
        })
}

fn merge_ingress(ingress: &mut Ingress, overrides: &IngressOverride) {
    if !overrides.annotations.is_empty() {
        // override values win on key collision
        ingress
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(overrides.annotations.clone());
    }
    if overrides.rules.is_empty() {
        return;
    }

    let rules = ingress
        .spec
        .get_or_insert_with(IngressSpec::default)
        .rules
        .get_or_insert_with(Vec::new);
    for rule in &overrides.rules {
        match rules.iter_mut().find(|existing| existing.host == rule.host) {
            Some(existing) => merge_rule_paths(existing, rule),
            None => rules.push(rule.clone()),
        }
    }
}

/// Merges the paths of one override rule into the existing rule for the same
/// host. A path matching on (path, pathType) is replaced in place so rule
/// order stays stable, everything else is appended.
fn merge_rule_paths(existing: &mut IngressRule, rule: &IngressRule) {
    let Some(override_http) = &rule.http else {
        return;
    };

    let paths = &mut existing
        .http
        .get_or_insert_with(HTTPIngressRuleValue::default)
        .paths;
    for path in &override_http.paths {
        match paths.iter_mut().find(|existing_path| {
            existing_path.path == path.path && existing_path.path_type == path.path_type
        }) {
            Some(existing_path) => *existing_path = path.clone(),
            None => paths.push(path.clone()),
        }
    }
}

/// Replaces ports sharing a name in place, appends the rest.
fn merge_service(service: &mut Service, overrides: &ServiceOverride) {
    let ports = service
        .spec
        .get_or_insert_with(ServiceSpec::default)
        .ports
        .get_or_insert_with(Vec::new);
    for port in &overrides.ports {
        match ports.iter_mut().find(|existing| existing.name == port.name) {
            Some(existing) => *existing = port.clone(),
            None => ports.push(port.clone()),
        }
    }
}
