//! Hardware identity and key material
//!
//! This module handles:
//! - Detecting the crypto element at boot
//! - Reading the element serial number used as certificate common name
//! - Reconstructing the self-signed device certificate from stored slots

mod element;

pub use element::{DeviceCertificate, FileSecureElement, SecureElement};
