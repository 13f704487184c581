//! Encoding and decoding of generic manifest documents.
//!
//! A document is represented as a [`DynamicObject`]: typed object metadata
//! plus an arbitrarily shaped payload. This keeps the pipeline agnostic of
//! the concrete resource kinds a template produces while still giving the
//! transformers structured access to `metadata`.
use std::{io::Write, str::FromStr};

use kube::core::{DynamicObject, GroupVersion, GroupVersionKind, gvk::ParseGroupVersionError};
use snafu::{OptionExt, ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to decode manifest document"))]
    DecodeDocument { source: serde_yaml::Error },

    #[snafu(display("manifest document is not an object"))]
    InvalidDocument { source: serde_json::Error },

    #[snafu(display("manifest document is empty"))]
    EmptyDocument,

    #[snafu(display("manifest document has no apiVersion or kind"))]
    MissingTypeMeta,

    #[snafu(display("manifest document has no object name"))]
    MissingObjectName,

    #[snafu(display("failed to parse apiVersion {api_version:?}"))]
    ParseGroupVersion {
        source: ParseGroupVersionError,
        api_version: String,
    },

    #[snafu(display("failed to serialize document {name:?}"))]
    SerializeDocument {
        source: serde_yaml::Error,
        name: String,
    },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },
}

/// Decodes a single manifest document and extracts its type descriptor.
///
/// Fails on malformed YAML, on a document that decodes to an empty or
/// non-object root, and on a document without `apiVersion`, `kind` or an
/// object name.
pub fn parse(input: &str) -> Result<(GroupVersionKind, DynamicObject)> {
    let value: serde_json::Value = serde_yaml::from_str(input).context(DecodeDocumentSnafu)?;
    from_value(value)
}

/// Validates one already-decoded document value.
///
/// Shared by [`parse`] and the multi-document template builder.
pub fn from_value(value: serde_json::Value) -> Result<(GroupVersionKind, DynamicObject)> {
    if value.is_null() {
        return EmptyDocumentSnafu.fail();
    }

    let document: DynamicObject = serde_json::from_value(value).context(InvalidDocumentSnafu)?;
    let gvk = gvk_of(&document)?;

    if document.metadata.name.as_deref().unwrap_or_default().is_empty() {
        return MissingObjectNameSnafu.fail();
    }

    Ok((gvk, document))
}

/// Extracts the (group, version, kind) descriptor of a document.
///
/// An empty group is valid and denotes the core API group.
pub fn gvk_of(document: &DynamicObject) -> Result<GroupVersionKind> {
    let types = document.types.as_ref().context(MissingTypeMetaSnafu)?;
    if types.api_version.is_empty() || types.kind.is_empty() {
        return MissingTypeMetaSnafu.fail();
    }

    let group_version =
        GroupVersion::from_str(&types.api_version).context(ParseGroupVersionSnafu {
            api_version: &types.api_version,
        })?;
    Ok(GroupVersionKind {
        group: group_version.group,
        version: group_version.version,
        kind: types.kind.clone(),
    })
}

/// Serializes `document` as an explicit YAML document (leading `---` line)
/// and writes it to `writer`.
pub fn serialize<W>(mut writer: W, document: &DynamicObject) -> Result<()>
where
    W: Write,
{
    writer
        .write_all(b"---\n")
        .context(WriteDocumentSeparatorSnafu)?;
    serde_yaml::to_writer(&mut writer, document).with_context(|_| SerializeDocumentSnafu {
        name: document.metadata.name.clone().unwrap_or_default(),
    })
}

/// Serializes a document set as one explicit multi-document YAML stream.
pub fn serialize_all<W>(mut writer: W, documents: &[DynamicObject]) -> Result<()>
where
    W: Write,
{
    for document in documents {
        serialize(&mut writer, document)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn parses_document_and_type_descriptor() {
        let (gvk, document) = parse(indoc! {"
            apiVersion: apps/v1
            kind: Deployment
            metadata:
              name: server
            spec:
              replicas: 1
        "})
        .expect("document is valid");

        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");
        assert_eq!(document.metadata.name.as_deref(), Some("server"));
        assert_eq!(
            document.data.pointer("/spec/replicas"),
            Some(&serde_json::Value::from(1))
        );
    }

    #[test]
    fn core_group_is_empty_but_valid() {
        let (gvk, _) = parse(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata:
              name: config
        "})
        .expect("document is valid");

        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
    }

    #[test]
    fn rejects_empty_document() {
        assert!(matches!(parse("null"), Err(Error::EmptyDocument)));
    }

    #[test]
    fn rejects_document_without_type_meta() {
        let result = parse(indoc! {"
            metadata:
              name: nameless
        "});
        assert!(matches!(result, Err(Error::MissingTypeMeta)));
    }

    #[test]
    fn rejects_document_without_name() {
        let result = parse(indoc! {"
            apiVersion: v1
            kind: ConfigMap
            metadata: {}
        "});
        assert!(matches!(result, Err(Error::MissingObjectName)));
    }

    #[test]
    fn rejects_malformed_api_version() {
        let result = parse(indoc! {"
            apiVersion: a/b/c
            kind: ConfigMap
            metadata:
              name: config
        "});
        assert!(matches!(result, Err(Error::ParseGroupVersion { .. })));
    }

    #[test]
    fn serializes_explicit_documents() {
        let (_, document) = parse("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: config\n")
            .expect("document is valid");

        let mut buf = Vec::new();
        serialize_all(&mut buf, &[document.clone(), document]).expect("serialization works");
        let out = String::from_utf8(buf).expect("output is UTF-8");

        assert_eq!(out.matches("---\n").count(), 2);
        assert!(out.starts_with("---\n"));
        assert!(out.contains("kind: ConfigMap"));
    }
}
