//! stowage-s3: S3 SDK adapter for stowage
//!
//! This crate provides the implementation of the ObjectStore and Connector
//! traits using the aws-sdk-s3 crate. It is the only crate that directly
//! depends on the AWS SDK.

pub mod client;

pub use client::{S3Client, S3Connector};
