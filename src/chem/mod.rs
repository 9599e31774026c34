//! Chemistry kernels: descriptors, metrics and match modes shared by the
//! similarity and substructure adaptors.

pub mod similarity;
pub mod substructure;
pub mod usr;

pub use similarity::{Fingerprint, FuzcavFingerprint, FuzcavMetric, Metric, OeMetric};
pub use substructure::{LigandMatch, StructureMatch};
pub use usr::{usrcat_similarity, UsrParams, UsrWeights};
