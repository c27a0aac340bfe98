pub mod detection;
pub mod request;
pub mod summary;

pub use detection::{
    keys, CombinedRecord, DetectorKind, FieldSpec, FieldType, FieldValue,
    NormalizedDetectorResult, FAILURE_SENTINEL,
};
pub use request::{DetectionRequest, ParticipantDocuments};
pub use summary::{
    CombinedFlagged, ConsolidatedTable, ParticipantReport, ParticipantSummary, ThresholdCount,
    FLAG_THRESHOLD, THRESHOLDS,
};
