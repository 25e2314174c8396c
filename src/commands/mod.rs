pub mod annotate;
pub mod featurize;
