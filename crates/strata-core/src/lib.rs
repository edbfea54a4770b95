//! Strata Core Types and Definitions
//!
//! This crate provides the foundational types shared by the Strata layout
//! pipeline. It includes:
//!
//! - **Identifiers**: String-interned uids used as node names in layout requests ([`identifier::Id`])
//! - **Colors**: CSS colors and the unique key colors used to tag regions ([`color`] module)
//! - **Geometry**: Points, sizes and bounding boxes ([`geometry`] module)
//! - **Text**: Label measurement ([`text::StringBounder`])
//! - **Model**: The arena-backed diagram model of entities and links ([`model`] module)

pub mod color;
pub mod geometry;
pub mod identifier;
pub mod model;
pub mod text;
