//! Templating core of the workload provisioning operator.
//!
//! A [`crd::WorkloadTemplate`] carries a parameterized, possibly multi-document
//! manifest. A [`crd::WorkloadInstance`] names such a template and supplies
//! concrete variable values plus per-resource overrides. This crate turns the
//! two into the final set of manifest documents that should exist in the
//! cluster for that instance:
//!
//! 1. [`build::build_documents`] substitutes variables into the raw manifest
//!    text and decodes it into generic [`kube::core::DynamicObject`] documents.
//! 2. [`transform::apply_all`] runs every document through an ordered chain of
//!    [`transform::DocumentTransform`]s which establish ownership, naming and
//!    labels, merge network overrides, apply replica-count overrides and apply
//!    RFC 6902 JSON patches.
//!
//! The crate is pure computation over in-memory documents. Talking to the
//! cluster, reconciling, retrying and writing output files are jobs for the
//! surrounding operator and CLI, not for this crate.

pub mod build;
pub mod crd;
pub mod document;
pub mod names;
pub mod substitution;
pub mod transform;

// External re-exports
pub use k8s_openapi;
pub use kube;
