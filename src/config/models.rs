//! Weather model registry and selector resolution.
//!
//! Model selector strings route requests to either the ensemble or the
//! deterministic forecast endpoint and label outputs. Ensemble ids are
//! validated against a static registry because member counts must be
//! known up front; deterministic ids pass through unvalidated since the
//! upstream provider adds new deterministic models often.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WxError};

/// Whether a model produces an ensemble of members or a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Ensemble,
    Deterministic,
}

/// Registry row for a known ensemble model.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub members: usize,
}

/// Known ensemble models and their member counts.
pub const ENSEMBLE_MODELS: &[EnsembleModelInfo] = &[
    EnsembleModelInfo {
        id: "ecmwf_ifs025",
        name: "ECMWF IFS 0.25° ensemble",
        members: 51,
    },
    EnsembleModelInfo {
        id: "ecmwf_aifs025",
        name: "ECMWF AIFS 0.25° ensemble",
        members: 51,
    },
    EnsembleModelInfo {
        id: "gem_global",
        name: "ECCC GEM Global ensemble",
        members: 21,
    },
    EnsembleModelInfo {
        id: "ukmo_global_ensemble_20km",
        name: "UKMO MOGREPS-G 20 km ensemble",
        members: 21,
    },
    EnsembleModelInfo {
        id: "ukmo_uk_ensemble_2km",
        name: "UKMO MOGREPS-UK 2 km ensemble",
        members: 3,
    },
    EnsembleModelInfo {
        id: "gfs025",
        name: "NOAA GFS 0.25° ensemble",
        members: 31,
    },
    EnsembleModelInfo {
        id: "icon_seamless",
        name: "DWD ICON seamless ensemble",
        members: 40,
    },
];

/// Default weather model when none is configured.
pub const DEFAULT_ENSEMBLE_MODEL: &str = "ecmwf_ifs025";

/// Deterministic models we can name nicely; unknown ids still resolve.
const DETERMINISTIC_NAMES: &[(&str, &str)] = &[("ecmwf_ifs", "ECMWF IFS HRES 9 km (deterministic)")];

/// Resolved weather model used to route API calls and label outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelector {
    pub kind: ModelKind,
    pub model_id: String,
    pub display_name: String,
    /// Member count; always 1 for deterministic models.
    pub members: usize,
}

impl ModelSelector {
    /// Resolve a model reference string into a validated selector.
    ///
    /// Accepted forms:
    /// - `ens:<ensemble-id>` (explicit ensemble)
    /// - `det:<forecast-id>` (explicit deterministic)
    /// - `<ensemble-id>` (bare id, treated as ensemble if known)
    /// - `<forecast-id>` (any other bare id, treated as deterministic)
    ///
    /// # Errors
    ///
    /// Unknown ensemble ids fail closed with a config error.
    pub fn resolve(value: Option<&str>) -> Result<Self> {
        let raw = value.unwrap_or("").trim();
        if raw.is_empty() {
            return Self::resolve(Some(&format!("ens:{DEFAULT_ENSEMBLE_MODEL}")));
        }

        let (explicit_kind, rest) = match raw.split_once(':') {
            Some((prefix, rest)) => match prefix.trim().to_lowercase().as_str() {
                "ens" | "ensemble" => (Some(ModelKind::Ensemble), rest.trim()),
                "det" | "deterministic" => (Some(ModelKind::Deterministic), rest.trim()),
                _ => (None, raw),
            },
            None => (None, raw),
        };
        let model_id = if rest.is_empty() {
            DEFAULT_ENSEMBLE_MODEL
        } else {
            rest
        };

        let kind = explicit_kind.unwrap_or_else(|| {
            if ensemble_info(model_id).is_some() {
                ModelKind::Ensemble
            } else {
                ModelKind::Deterministic
            }
        });

        match kind {
            ModelKind::Ensemble => {
                let info = ensemble_info(model_id)
                    .ok_or_else(|| WxError::UnknownEnsembleModel(model_id.to_string()))?;
                Ok(Self {
                    kind: ModelKind::Ensemble,
                    model_id: info.id.to_string(),
                    display_name: info.name.to_string(),
                    members: info.members,
                })
            }
            ModelKind::Deterministic => {
                let display_name = DETERMINISTIC_NAMES
                    .iter()
                    .find(|(id, _)| *id == model_id)
                    .map_or_else(|| model_id.to_string(), |(_, name)| (*name).to_string());
                Ok(Self {
                    kind: ModelKind::Deterministic,
                    model_id: model_id.to_string(),
                    display_name,
                    members: 1,
                })
            }
        }
    }

    /// Short token used in cache keys (`ens`/`det`).
    #[must_use]
    pub const fn kind_token(&self) -> &'static str {
        match self.kind {
            ModelKind::Ensemble => "ens",
            ModelKind::Deterministic => "det",
        }
    }

    #[must_use]
    pub const fn is_ensemble(&self) -> bool {
        matches!(self.kind, ModelKind::Ensemble)
    }
}

fn ensemble_info(id: &str) -> Option<&'static EnsembleModelInfo> {
    ENSEMBLE_MODELS.iter().find(|info| info.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_resolves_to_default_ensemble() {
        let model = ModelSelector::resolve(None).unwrap();
        assert_eq!(model.model_id, DEFAULT_ENSEMBLE_MODEL);
        assert_eq!(model.kind, ModelKind::Ensemble);
        assert_eq!(model.members, 51);
    }

    #[test]
    fn bare_known_ensemble_id() {
        let model = ModelSelector::resolve(Some("gem_global")).unwrap();
        assert_eq!(model.kind, ModelKind::Ensemble);
        assert_eq!(model.members, 21);
    }

    #[test]
    fn explicit_prefixes() {
        let ens = ModelSelector::resolve(Some("ens:gfs025")).unwrap();
        assert_eq!(ens.kind, ModelKind::Ensemble);
        assert_eq!(ens.members, 31);

        let det = ModelSelector::resolve(Some("det:ecmwf_ifs")).unwrap();
        assert_eq!(det.kind, ModelKind::Deterministic);
        assert_eq!(det.members, 1);
    }

    #[test]
    fn unknown_ensemble_fails_closed() {
        let err = ModelSelector::resolve(Some("ens:made_up_model")).unwrap_err();
        assert!(matches!(err, WxError::UnknownEnsembleModel(_)));
    }

    #[test]
    fn unknown_bare_id_is_deterministic() {
        let model = ModelSelector::resolve(Some("icon_d2")).unwrap();
        assert_eq!(model.kind, ModelKind::Deterministic);
        assert_eq!(model.model_id, "icon_d2");
        assert_eq!(model.members, 1);
    }

    #[test]
    fn kind_token_feeds_cache_keys() {
        let ens = ModelSelector::resolve(Some("ens:gfs025")).unwrap();
        assert_eq!(ens.kind_token(), "ens");
        let det = ModelSelector::resolve(Some("det:ecmwf_ifs")).unwrap();
        assert_eq!(det.kind_token(), "det");
    }
}
