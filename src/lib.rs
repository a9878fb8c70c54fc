//! managed-certs-controller: provisions Compute Engine managed SslCertificates
//! for `networking.gke.io` ManagedCertificate resources.
//!
//! Each ManagedCertificate maps to exactly one SslCertificate. The controller
//! keeps that mapping in a [`controller::StateStore`], reconciles changes as
//! they arrive and periodically garbage-collects SslCertificates nobody owns.

pub mod controller;
pub mod crd;
pub mod error;
pub mod provider;

#[cfg(feature = "rest-api")]
pub mod rest_api;

pub use crate::error::{Error, Result};
