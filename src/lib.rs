//! Multi-aspect retrieval evaluation.
//!
//! Reconciles a similarity-ranked result list with judgments on up to three
//! independent aspects (relevance, credibility, ...) and scores the ranking
//! with measures that fold the aspects into one number per query: CAM over
//! nDCG or average precision, NLRE, and NWCS.

pub mod error;
pub mod measures;
pub mod model;
pub mod reconcile;

pub use error::{Collection, EvalError};
pub use measures::{
    Measure, MeasureRegistry, score_cam, score_cam_map, score_nlre, score_nwcs,
};
pub use model::{
    EvaluationBundle, EvaluationConfig, IdealSentinels, JudgedDocument, QueryInput,
    QueryJudgments, QueryResults, RetrievedDocument,
};
pub use reconcile::{
    IdealEntry, ReconcileStats, ReconciledEntry, Reconciler, Reconciliation, reconcile,
    reconcile_with,
};
