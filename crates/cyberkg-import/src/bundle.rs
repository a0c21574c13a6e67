//! STIX-style bundle model.
//!
//! Only the fields the importer reads are modelled. Objects are classified
//! by their `type` discriminator; anything other than `attack-pattern` and
//! `x-mitre-tactic` lands in [`BundleObject::Other`].

use std::path::Path;

use serde::Deserialize;

use cyberkg_core::{Tactic, Technique};

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Bundle {
    pub objects: Vec<BundleObject>,
}

impl Bundle {
    /// Read and parse a bundle file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Split into techniques, tactics, and the count of ignored objects.
    pub fn partition(self) -> (Vec<AttackPattern>, Vec<MitreTactic>, usize) {
        let mut techniques = Vec::new();
        let mut tactics = Vec::new();
        let mut ignored = 0;
        for object in self.objects {
            match object {
                BundleObject::Technique(t) => techniques.push(t),
                BundleObject::Tactic(t) => tactics.push(t),
                BundleObject::Other => ignored += 1,
            }
        }
        (techniques, tactics, ignored)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BundleObject {
    #[serde(rename = "attack-pattern")]
    Technique(AttackPattern),
    #[serde(rename = "x-mitre-tactic")]
    Tactic(MitreTactic),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalReference {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KillChainPhase {
    #[serde(default)]
    pub kill_chain_name: String,
    #[serde(default)]
    pub phase_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttackPattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
    #[serde(default)]
    pub kill_chain_phases: Vec<KillChainPhase>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MitreTactic {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub x_mitre_shortname: Option<String>,
    #[serde(default)]
    pub external_references: Vec<ExternalReference>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
}

impl AttackPattern {
    /// Phase names under `kill_chain_name`, in bundle order.
    pub fn phases<'a>(&'a self, kill_chain_name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.kill_chain_phases
            .iter()
            .filter(move |p| p.kill_chain_name == kill_chain_name)
            .map(|p| p.phase_name.as_str())
    }

    pub fn to_technique(&self, max_text_len: Option<usize>) -> Technique {
        let (external_id, url) = first_reference(&self.external_references);
        Technique {
            id: self.id.clone(),
            name: self.name.clone(),
            description: clip(self.description.as_deref(), max_text_len),
            external_id,
            url,
            created: self.created.clone().unwrap_or_default(),
            modified: self.modified.clone().unwrap_or_default(),
        }
    }
}

impl MitreTactic {
    pub fn shortname(&self) -> &str {
        self.x_mitre_shortname.as_deref().unwrap_or_default()
    }

    pub fn to_tactic(&self, max_text_len: Option<usize>) -> Tactic {
        let (external_id, url) = first_reference(&self.external_references);
        Tactic {
            id: self.id.clone(),
            name: self.name.clone(),
            description: clip(self.description.as_deref(), max_text_len),
            shortname: self.shortname().to_string(),
            external_id,
            url,
            created: self.created.clone().unwrap_or_default(),
            modified: self.modified.clone().unwrap_or_default(),
        }
    }
}

fn first_reference(refs: &[ExternalReference]) -> (String, String) {
    match refs.first() {
        Some(r) => (
            r.external_id.clone().unwrap_or_default(),
            r.url.clone().unwrap_or_default(),
        ),
        None => (String::new(), String::new()),
    }
}

/// Keep at most `max` characters, cutting on a char boundary.
fn clip(text: Option<&str>, max: Option<usize>) -> String {
    let text = text.unwrap_or_default();
    match max {
        Some(max) => match text.char_indices().nth(max) {
            Some((cut, _)) => text[..cut].to_string(),
            None => text.to_string(),
        },
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "bundle",
        "objects": [
            {
                "type": "attack-pattern",
                "id": "attack-pattern--1",
                "name": "Phishing",
                "description": "Adversaries may send phishing messages.",
                "external_references": [
                    {"source_name": "mitre-attack", "external_id": "T1566",
                     "url": "https://attack.mitre.org/techniques/T1566"},
                    {"source_name": "capec", "external_id": "CAPEC-98"}
                ],
                "kill_chain_phases": [
                    {"kill_chain_name": "mitre-attack", "phase_name": "initial-access"},
                    {"kill_chain_name": "other-framework", "phase_name": "delivery"}
                ],
                "created": "2020-03-02T18:45:07.892Z"
            },
            {
                "type": "x-mitre-tactic",
                "id": "x-mitre-tactic--1",
                "name": "Initial Access",
                "x_mitre_shortname": "initial-access"
            },
            {"type": "relationship", "id": "relationship--1"},
            {"type": "identity", "id": "identity--1", "name": "MITRE"}
        ]
    }"#;

    #[test]
    fn test_partition_by_type() {
        let bundle = Bundle::from_json(SAMPLE).unwrap();
        let (techniques, tactics, ignored) = bundle.partition();
        assert_eq!(techniques.len(), 1);
        assert_eq!(tactics.len(), 1);
        assert_eq!(ignored, 2);
        assert_eq!(tactics[0].shortname(), "initial-access");
    }

    #[test]
    fn test_technique_flattening() {
        let (techniques, _, _) = Bundle::from_json(SAMPLE).unwrap().partition();
        let t = techniques[0].to_technique(None);
        assert_eq!(t.external_id, "T1566");
        assert_eq!(t.url, "https://attack.mitre.org/techniques/T1566");
        assert_eq!(t.created, "2020-03-02T18:45:07.892Z");
        assert_eq!(t.modified, "");

        let phases: Vec<&str> = techniques[0].phases("mitre-attack").collect();
        assert_eq!(phases, vec!["initial-access"]);
    }

    #[test]
    fn test_tactic_without_references() {
        let (_, tactics, _) = Bundle::from_json(SAMPLE).unwrap().partition();
        let t = tactics[0].to_tactic(None);
        assert_eq!(t.external_id, "");
        assert_eq!(t.url, "");
        assert_eq!(t.description, "");
    }

    #[test]
    fn test_missing_name_is_parse_error() {
        let raw = r#"{"objects": [{"type": "attack-pattern", "id": "attack-pattern--2"}]}"#;
        assert!(matches!(
            Bundle::from_json(raw),
            Err(crate::error::ImportError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_objects_is_parse_error() {
        let raw = r#"{"type": "bundle", "id": "bundle--x"}"#;
        assert!(matches!(
            Bundle::from_json(raw),
            Err(crate::error::ImportError::Parse(_))
        ));
    }

    #[test]
    fn test_empty_objects_is_accepted() {
        let bundle = Bundle::from_json(r#"{"objects": []}"#).unwrap();
        assert!(bundle.objects.is_empty());
    }

    #[test]
    fn test_clip_respects_char_boundaries() {
        assert_eq!(clip(Some("héllo"), Some(2)), "hé");
        assert_eq!(clip(Some("short"), Some(10)), "short");
        assert_eq!(clip(Some("untouched"), None), "untouched");
        assert_eq!(clip(None, Some(3)), "");
    }
}
