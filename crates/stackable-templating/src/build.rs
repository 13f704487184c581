//! Builds the concrete manifest documents of a workload instance.
//!
//! The build pipeline substitutes variables into the raw template text and
//! decodes the result into one [`DynamicObject`] per manifest document. The
//! first decode failure aborts the build, there are no partial results.
use kube::core::DynamicObject;
use serde::Deserialize;
use snafu::{ResultExt, Snafu, ensure};
use tracing::debug;

use crate::{
    crd::{WorkloadInstance, WorkloadTemplate},
    document, substitution,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to decode manifest document {index}"))]
    DecodeManifestDocument {
        source: serde_yaml::Error,
        index: usize,
    },

    #[snafu(display("invalid manifest document {index}"))]
    InvalidManifestDocument {
        source: document::Error,
        index: usize,
    },

    #[snafu(display("template {template:?} produced no documents"))]
    EmptyManifest { template: String },
}

/// Renders the template manifest for `instance` and parses every document.
///
/// Variable substitution runs over the whole raw text before parsing,
/// default variables first, then the custom variables resolved from the
/// template parameter defaults and the instance values. Documents are
/// separated by `---` lines; the separator is recognized by the YAML parser
/// itself, so a `---` inside a quoted scalar or block literal never splits a
/// document. Blank documents are dropped, a manifest without any non-blank
/// document is an error.
pub fn build_documents(
    template: &WorkloadTemplate,
    instance: &WorkloadInstance,
) -> Result<Vec<DynamicObject>> {
    let text = substitution::substitute_defaults(&template.spec.manifest, instance);
    let vars = substitution::resolve_vars(template, instance);
    let text = substitution::substitute_vars(&text, &vars);

    let mut documents = Vec::new();
    for (index, deserializer) in serde_yaml::Deserializer::from_str(&text).enumerate() {
        let value = serde_json::Value::deserialize(deserializer)
            .context(DecodeManifestDocumentSnafu { index })?;
        if value.is_null() {
            // blank block between separators
            continue;
        }

        let (gvk, document) =
            document::from_value(value).context(InvalidManifestDocumentSnafu { index })?;
        debug!(
            kind = %gvk.kind,
            name = document.metadata.name.as_deref().unwrap_or_default(),
            "built manifest document"
        );
        documents.push(document);
    }

    ensure!(
        !documents.is_empty(),
        EmptyManifestSnafu {
            template: instance.spec.template.clone(),
        }
    );
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use indoc::indoc;

    use super::*;
    use crate::crd::{Overrides, WorkloadInstanceSpec, WorkloadTemplateSpec};

    fn template(manifest: &str) -> WorkloadTemplate {
        WorkloadTemplate::new(
            "base-template",
            WorkloadTemplateSpec {
                description: String::new(),
                parameters: Vec::new(),
                manifest: manifest.to_owned(),
            },
        )
    }

    fn instance(name: &str, namespace: Option<&str>) -> WorkloadInstance {
        let mut instance = WorkloadInstance::new(
            name,
            WorkloadInstanceSpec {
                template: "base-template".to_owned(),
                vars: BTreeMap::new(),
                overrides: Overrides::default(),
            },
        );
        instance.metadata.namespace = namespace.map(str::to_owned);
        instance
    }

    #[test]
    fn builds_multi_document_manifests() {
        let template = template(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
            ---
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: server
        "});

        let documents =
            build_documents(&template, &instance("cs1", Some("prod"))).expect("build works");
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].metadata.name.as_deref(), Some("config"));
        assert_eq!(documents[1].metadata.name.as_deref(), Some("server"));
    }

    #[test]
    fn drops_blank_documents() {
        let template = template(indoc! {"
            ---
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
            ---
            ---
        "});

        let documents =
            build_documents(&template, &instance("cs1", Some("prod"))).expect("build works");
        assert_eq!(documents.len(), 1);
    }

    #[test]
    fn separator_inside_quoted_scalar_does_not_split() {
        let template = template(indoc! {r#"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
            data:
              file1: "---\naaa\n---\nbbb\n"
        "#});

        let documents =
            build_documents(&template, &instance("cs1", Some("prod"))).expect("build works");
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].data.pointer("/data/file1"),
            Some(&serde_json::Value::from("---\naaa\n---\nbbb\n"))
        );
    }

    #[test]
    fn separator_inside_block_literal_does_not_split() {
        let template = template(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
            data:
              notes: |
                ---
                aaa
                ---
                bbb
        "});

        let documents =
            build_documents(&template, &instance("cs1", Some("prod"))).expect("build works");
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].data.pointer("/data/notes"),
            Some(&serde_json::Value::from("---\naaa\n---\nbbb\n"))
        );
    }

    #[test]
    fn empty_manifest_is_an_error() {
        let template = template("---\n");
        let result = build_documents(&template, &instance("cs1", Some("prod")));
        assert!(matches!(result, Err(Error::EmptyManifest { .. })));
    }

    #[test]
    fn first_parse_error_aborts_the_build() {
        let template = template(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
            ---
            metadata:
              name: no-type-meta
        "});

        let result = build_documents(&template, &instance("cs1", Some("prod")));
        assert!(matches!(
            result,
            Err(Error::InvalidManifestDocument { index: 1, .. })
        ));
    }

    #[test]
    fn substitutes_variables_before_parsing() {
        let template = template(indoc! {r#"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: deploy
            spec:
              template:
                spec:
                  containers:
                  - name: app
                    command: [sh, -c, "echo {{NAMESPACE}}/{{INSTANCE}}"]
        "#});

        let documents =
            build_documents(&template, &instance("inst", Some("default"))).expect("build works");
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].data.pointer("/spec/template/spec/containers/0/command"),
            Some(&serde_json::json!(["sh", "-c", "echo default/inst"]))
        );
    }
}
