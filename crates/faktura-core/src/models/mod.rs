//! Data models for invoice extraction.

pub mod fragment;
pub mod invoice;
