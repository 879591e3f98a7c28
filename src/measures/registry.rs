use std::collections::BTreeMap;

use regex::Regex;
use serde::Serialize;

use super::{Cam, CamMap, GainOverride, Measure, Nlre, Nwcs};
use crate::error::EvalError;
use crate::model::EvaluationConfig;

const REQUEST_PATTERN: &str = r"^(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?:\.(?P<params>.*))?$";
const GAIN_PAIR_PATTERN: &str =
    r"^\s*(?P<level>-?\d+)\s*=\s*(?P<gain>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*$";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureFamily {
    Cam,
    CamMap,
    Nlre,
    Nwcs,
}

impl MeasureFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cam => "cam",
            Self::CamMap => "cam_map",
            Self::Nlre => "nlre",
            Self::Nwcs => "nwcs",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureDefinition {
    pub name: &'static str,
    pub family: MeasureFamily,
    pub aspects: usize,
    pub accepts_parameters: bool,
    pub description: &'static str,
}

/// A measure name with its optional trec_eval-style parameter string,
/// e.g. `cam.1=0,2=5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRequest {
    pub name: String,
    pub params: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MeasureRegistry {
    definitions: BTreeMap<&'static str, MeasureDefinition>,
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl MeasureRegistry {
    pub fn standard() -> Self {
        let mut definitions = BTreeMap::new();
        for aspects in [2, 3] {
            let suffix_three = aspects == 3;
            let entries = [
                MeasureDefinition {
                    name: if suffix_three { "cam_three" } else { "cam" },
                    family: MeasureFamily::Cam,
                    aspects,
                    accepts_parameters: true,
                    description: "convex aggregate of per-aspect nDCG; params level=gain,...",
                },
                MeasureDefinition {
                    name: if suffix_three { "cam_map_three" } else { "cam_map" },
                    family: MeasureFamily::CamMap,
                    aspects,
                    accepts_parameters: false,
                    description: "convex aggregate of per-aspect average precision",
                },
                MeasureDefinition {
                    name: if suffix_three { "nlre_three" } else { "nlre" },
                    family: MeasureFamily::Nlre,
                    aspects,
                    accepts_parameters: false,
                    description: "normalized local rank error across aspect orderings",
                },
                MeasureDefinition {
                    name: if suffix_three { "nwcs_three" } else { "nwcs" },
                    family: MeasureFamily::Nwcs,
                    aspects,
                    accepts_parameters: false,
                    description: "normalized weighted cumulative score of aspect sums",
                },
            ];
            for definition in entries {
                definitions.insert(definition.name, definition);
            }
        }
        Self { definitions }
    }

    pub fn get(&self, name: &str) -> Option<&MeasureDefinition> {
        self.definitions.get(name)
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MeasureDefinition> {
        self.definitions.values()
    }

    pub fn for_aspects(&self, aspects: usize) -> impl Iterator<Item = &MeasureDefinition> {
        self.definitions
            .values()
            .filter(move |definition| definition.aspects == aspects)
    }

    /// Build a measure from a request such as `nlre_three` or `cam.1=0,2=5`.
    pub fn resolve(
        &self,
        request: &str,
        config: &EvaluationConfig,
    ) -> Result<Box<dyn Measure>, EvalError> {
        let request = parse_measure_request(request)?;
        let definition = self
            .get(&request.name)
            .ok_or_else(|| EvalError::UnknownMeasure(request.name.clone()))?;

        let params = request
            .params
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if params.is_some() && !definition.accepts_parameters {
            return Err(EvalError::InvalidParameter {
                measure: definition.name.to_string(),
                reason: "measure takes no parameters".to_string(),
            });
        }

        let measure: Box<dyn Measure> = match definition.family {
            MeasureFamily::Cam => {
                let overrides = match params {
                    Some(params) => parse_gain_overrides(definition.name, params)?,
                    None => Vec::new(),
                };
                Box::new(Cam::new(definition.aspects, overrides))
            }
            MeasureFamily::CamMap => {
                Box::new(CamMap::new(definition.aspects, config.relevance_level))
            }
            MeasureFamily::Nlre => Box::new(Nlre::new(definition.aspects)),
            MeasureFamily::Nwcs => Box::new(Nwcs::new(definition.aspects)),
        };
        Ok(measure)
    }
}

pub fn parse_measure_request(request: &str) -> Result<MeasureRequest, EvalError> {
    let pattern = Regex::new(REQUEST_PATTERN).map_err(|err| invalid(request, err.to_string()))?;
    let trimmed = request.trim();
    let captures = pattern
        .captures(trimmed)
        .ok_or_else(|| invalid(trimmed, "expected name or name.params".to_string()))?;

    Ok(MeasureRequest {
        name: captures["name"].to_ascii_lowercase(),
        params: captures.name("params").map(|value| value.as_str().to_string()),
    })
}

/// Parse `level=gain` pairs separated by commas.
pub fn parse_gain_overrides(measure: &str, params: &str) -> Result<Vec<GainOverride>, EvalError> {
    let pattern = Regex::new(GAIN_PAIR_PATTERN).map_err(|err| invalid(measure, err.to_string()))?;

    let mut overrides = Vec::<GainOverride>::new();
    for pair in params.split(',').filter(|pair| !pair.trim().is_empty()) {
        let captures = pattern
            .captures(pair)
            .ok_or_else(|| invalid(measure, format!("expected level=gain, found {pair:?}")))?;
        let level = captures["level"]
            .parse::<i64>()
            .map_err(|err| invalid(measure, format!("bad level in {pair:?}: {err}")))?;
        let gain = captures["gain"]
            .parse::<f64>()
            .map_err(|err| invalid(measure, format!("bad gain in {pair:?}: {err}")))?;

        if overrides.iter().any(|existing| existing.level == level) {
            return Err(invalid(measure, format!("level {level} given twice")));
        }
        overrides.push(GainOverride { level, gain });
    }
    Ok(overrides)
}

fn invalid(measure: &str, reason: String) -> EvalError {
    EvalError::InvalidParameter {
        measure: measure.to_string(),
        reason,
    }
}
