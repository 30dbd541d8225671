pub mod matcher;
pub mod normalization;
pub mod projector;
pub mod report;
pub mod resolver;
pub(crate) mod romaji;
pub mod segment_store;
pub mod similarity;
