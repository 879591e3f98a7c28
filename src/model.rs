use serde::{Deserialize, Serialize};

pub const JUDGMENTS_FORMAT: &str = "qrels";
pub const RESULTS_FORMAT: &str = "trec_results";
pub const MAX_ASPECTS: usize = 3;

/// Default cap on retrieved documents considered per query.
pub const DEFAULT_MAX_DOCS_PER_QUERY: usize = 1000;

/// One assessed document with its per-aspect levels.
///
/// A negative level marks a document that is in the judgment pool but was
/// never actually assessed on that aspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgedDocument {
    pub document_id: String,
    pub aspects: Vec<i64>,
}

impl JudgedDocument {
    pub fn new(document_id: impl Into<String>, aspects: &[i64]) -> Self {
        Self {
            document_id: document_id.into(),
            aspects: aspects.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub document_id: String,
    pub similarity: f64,
}

impl RetrievedDocument {
    pub fn new(document_id: impl Into<String>, similarity: f64) -> Self {
        Self {
            document_id: document_id.into(),
            similarity,
        }
    }
}

fn default_judgments_format() -> String {
    JUDGMENTS_FORMAT.to_string()
}

fn default_results_format() -> String {
    RESULTS_FORMAT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryJudgments {
    pub query_id: String,
    #[serde(default = "default_judgments_format")]
    pub format: String,
    pub aspects: usize,
    pub documents: Vec<JudgedDocument>,
}

impl QueryJudgments {
    pub fn new(query_id: impl Into<String>, aspects: usize, documents: Vec<JudgedDocument>) -> Self {
        Self {
            query_id: query_id.into(),
            format: default_judgments_format(),
            aspects,
            documents,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query_id: String,
    #[serde(default = "default_results_format")]
    pub format: String,
    pub documents: Vec<RetrievedDocument>,
}

impl QueryResults {
    pub fn new(query_id: impl Into<String>, documents: Vec<RetrievedDocument>) -> Self {
        Self {
            query_id: query_id.into(),
            format: default_results_format(),
            documents,
        }
    }
}

/// How negative sentinels enter the aspect sum of the ideal ranking.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdealSentinels {
    /// Sum the judged values as recorded, sentinels included.
    #[default]
    Raw,
    /// Count sentinels as 0.
    Zeroed,
}

impl IdealSentinels {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Zeroed => "zeroed",
        }
    }

    pub(crate) fn contribution(self, value: i64) -> i64 {
        match self {
            Self::Raw => value,
            Self::Zeroed => value.max(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub max_docs_per_query: usize,
    pub relevance_level: i64,
    pub ideal_sentinels: IdealSentinels,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_docs_per_query: DEFAULT_MAX_DOCS_PER_QUERY,
            relevance_level: 1,
            ideal_sentinels: IdealSentinels::Raw,
        }
    }
}

/// A set of already-parsed queries handed to the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationBundle {
    pub queries: Vec<QueryInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInput {
    pub judgments: QueryJudgments,
    pub results: QueryResults,
}

impl QueryInput {
    pub fn query_id(&self) -> &str {
        &self.results.query_id
    }
}

impl EvaluationBundle {
    /// Aspect count shared by every query, if the bundle is uniform.
    pub fn aspects(&self) -> Option<usize> {
        let first = self.queries.first()?.judgments.aspects;
        self.queries
            .iter()
            .all(|query| query.judgments.aspects == first)
            .then_some(first)
    }

    pub fn query(&self, query_id: &str) -> Option<&QueryInput> {
        self.queries.iter().find(|query| query.query_id() == query_id)
    }
}
