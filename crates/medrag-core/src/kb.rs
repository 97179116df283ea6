//! Knowledge-base loaders for the two collections.
//!
//! - disease KB: JSONL, one disease per line (`disease_id`, `name`, and the
//!   text from `text`, else `description`, else `symptoms` joined by spaces)
//! - treatments: a JSON array of `{disease_id, name, treatments: [..]}`

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::lookup::join_payload;
use crate::types::EntityEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseRecord {
    pub disease_id: String,
    pub name: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct RawDisease {
    disease_id: Option<String>,
    name: Option<String>,
    text: Option<String>,
    description: Option<String>,
    #[serde(default)]
    symptoms: Vec<String>,
}

impl From<RawDisease> for DiseaseRecord {
    fn from(raw: RawDisease) -> Self {
        let text = [raw.text, raw.description]
            .into_iter()
            .flatten()
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| raw.symptoms.join(" "));
        Self {
            disease_id: raw.disease_id.unwrap_or_else(|| "UNKNOWN".to_string()),
            name: raw.name.unwrap_or_default(),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreatmentRecord {
    pub disease_id: String,
    pub name: String,
    #[serde(default)]
    pub treatments: Vec<String>,
}

impl TreatmentRecord {
    pub fn to_entry(&self) -> EntityEntry {
        EntityEntry { entity_id: self.disease_id.clone(), entity_name: self.name.clone(), payload: join_payload(self.treatments.as_slice()) }
    }
}

pub fn read_diseases<R: Read>(reader: R) -> Result<Vec<DiseaseRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(reader).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let raw: RawDisease = serde_json::from_str(&line)
            .map_err(|e| Error::InvalidInput(format!("disease KB line {}: {e}", line_no + 1)))?;
        records.push(raw.into());
    }
    Ok(records)
}

pub fn load_diseases(path: &Path) -> Result<Vec<DiseaseRecord>> {
    let records = read_diseases(fs::File::open(path)?)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded disease KB");
    Ok(records)
}

pub fn read_treatments<R: Read>(reader: R) -> Result<Vec<TreatmentRecord>> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_treatments(path: &Path) -> Result<Vec<TreatmentRecord>> {
    let records = read_treatments(fs::File::open(path)?)?;
    tracing::info!(path = %path.display(), records = records.len(), "loaded treatments");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disease_text_falls_back_in_order() {
        let jsonl = r#"{"disease_id":"D1","name":"Flu","text":"fever cough"}
{"disease_id":"D2","name":"Cold","text":"","description":"runny nose"}

{"name":"Mystery","symptoms":["rash","itch"]}
"#;
        let records = read_diseases(jsonl.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].text, "fever cough");
        assert_eq!(records[1].text, "runny nose");
        assert_eq!(records[2].disease_id, "UNKNOWN");
        assert_eq!(records[2].text, "rash itch");
    }

    #[test]
    fn malformed_line_names_its_number() {
        let jsonl = "{\"disease_id\":\"D1\"}\nnot json\n";
        let err = read_diseases(jsonl.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn treatments_join_into_payload() {
        let json = r#"[{"disease_id":"D1","name":"Flu","treatments":["Rest","Fluids"]},{"disease_id":"D2","name":"None"}]"#;
        let records = read_treatments(json.as_bytes()).unwrap();
        assert_eq!(records[0].to_entry().payload, "Rest, Fluids");
        assert_eq!(records[1].to_entry().payload, "");
    }
}
