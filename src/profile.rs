//! The structured professional profile produced by the model stage.
//!
//! Field names on the wire are the exact keys the instruction payload asks
//! the model for (`"Professional Title"`, `"Full Work History"`, …). Model
//! output is loose: a field may be missing, `null`, a number where text was
//! expected, or a bare string where a list was expected. Decoding is therefore
//! lenient and always yields every field, with empty text/lists standing in
//! for absent data.

use serde::de::{self, DeserializeOwned, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Top-level scalar fields, in wire order.
pub const SCALAR_FIELDS: [&str; 3] = ["Name", "Professional Title", "Summary"];

/// One resume turned into a capability profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(rename = "Name", default, deserialize_with = "lenient_text")]
    pub name: String,

    #[serde(
        rename = "Professional Title",
        default,
        deserialize_with = "lenient_text"
    )]
    pub professional_title: String,

    #[serde(rename = "Industries", default)]
    pub industries: Industries,

    #[serde(rename = "Qualifications", default, deserialize_with = "lenient_list")]
    pub qualifications: Vec<Qualification>,

    #[serde(rename = "Summary", default, deserialize_with = "lenient_text")]
    pub summary: String,

    #[serde(rename = "Experience", default, deserialize_with = "lenient_list")]
    pub experience: Vec<ExperienceEntry>,

    #[serde(
        rename = "Full Work History",
        default,
        deserialize_with = "lenient_list"
    )]
    pub full_work_history: Vec<WorkHistoryEntry>,

    /// Keys the model returned beyond the declared ones, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileRecord {
    /// Parse a record from the JSON text recovered out of a model response.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Canonical byte encoding: pretty-printed UTF-8 JSON, 2-space indent.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Text for every top-level scalar field, keyed by its wire name.
    ///
    /// Declared scalars are always present (possibly empty); extra keys are
    /// included only when their value is a string, number or boolean.
    pub fn scalar_fields(&self) -> HashMap<String, String> {
        let mut fields = HashMap::with_capacity(SCALAR_FIELDS.len() + self.extra.len());
        for (key, value) in &self.extra {
            match value {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    fields.insert(key.clone(), value_to_text(value));
                }
                _ => {}
            }
        }
        fields.insert("Name".to_string(), self.name.clone());
        fields.insert(
            "Professional Title".to_string(),
            self.professional_title.clone(),
        );
        fields.insert("Summary".to_string(), self.summary.clone());
        fields
    }

    /// `Name` trimmed, or `None` when the model left it blank.
    pub fn display_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// `{"Degree": …, "Institution": …}` — both keys always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    #[serde(rename = "Degree", default, deserialize_with = "lenient_text")]
    pub degree: String,

    #[serde(rename = "Institution", default, deserialize_with = "lenient_text")]
    pub institution: String,
}

impl Qualification {
    /// An entry whose Degree is "Certifications" (any case) lists several
    /// certificates, `;`-separated, in its Institution field.
    pub fn is_certification_list(&self) -> bool {
        self.degree.trim().eq_ignore_ascii_case("certifications")
    }

    /// The non-empty `;`-separated items of a certification list.
    pub fn certification_items(&self) -> Vec<&str> {
        self.institution
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    #[serde(rename = "Role", default, deserialize_with = "lenient_text")]
    pub role: String,

    #[serde(rename = "Company", default, deserialize_with = "lenient_text")]
    pub company: String,

    #[serde(rename = "Start Date", default, deserialize_with = "lenient_text")]
    pub start_date: String,

    #[serde(rename = "End Date", default, deserialize_with = "lenient_text")]
    pub end_date: String,

    #[serde(rename = "Details", default, deserialize_with = "lenient_text")]
    pub details: String,

    #[serde(rename = "Key Highlights", default, deserialize_with = "lenient_texts")]
    pub key_highlights: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkHistoryEntry {
    #[serde(rename = "Company", default, deserialize_with = "lenient_text")]
    pub company: String,

    #[serde(rename = "Years", default, deserialize_with = "lenient_text")]
    pub years: String,

    #[serde(rename = "Role", default, deserialize_with = "lenient_text")]
    pub role: String,
}

// ── Industries ───────────────────────────────────────────────────────────

/// Industry name → companies, in the order the model listed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Industries(Vec<IndustryGroup>);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndustryGroup {
    pub industry: String,
    pub companies: Vec<String>,
}

impl Industries {
    pub fn new(groups: Vec<IndustryGroup>) -> Self {
        Self(groups)
    }

    pub fn groups(&self) -> &[IndustryGroup] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Serialize for Industries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in &self.0 {
            map.serialize_entry(&group.industry, &group.companies)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Industries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(IndustriesVisitor)
    }
}

struct IndustriesVisitor;

impl<'de> Visitor<'de> for IndustriesVisitor {
    type Value = Industries;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of industry name to company list")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Industries, A::Error> {
        let mut groups = Vec::new();
        while let Some((industry, companies)) = access.next_entry::<String, Value>()? {
            groups.push(IndustryGroup {
                industry,
                companies: value_to_texts(companies),
            });
        }
        Ok(Industries(groups))
    }

    // A bare list of industry names, no companies.
    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Industries, A::Error> {
        let mut groups = Vec::new();
        while let Some(value) = access.next_element::<Value>()? {
            let industry = value_to_text(&value);
            if !industry.is_empty() {
                groups.push(IndustryGroup {
                    industry,
                    companies: Vec::new(),
                });
            }
        }
        Ok(Industries(groups))
    }

    fn visit_str<E: de::Error>(self, _v: &str) -> Result<Industries, E> {
        Ok(Industries::default())
    }

    fn visit_unit<E: de::Error>(self) -> Result<Industries, E> {
        Ok(Industries::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<Industries, E> {
        Ok(Industries::default())
    }
}

// ── Lenient decoding helpers ─────────────────────────────────────────────

/// Render any JSON value as display text. `null` becomes the empty string.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => value.to_string(),
    }
}

fn value_to_texts(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(value_to_text)
            .collect(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        other => vec![value_to_text(&other)],
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(value_to_text).unwrap_or_default())
}

fn lenient_texts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.map(value_to_texts).unwrap_or_default())
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .filter(|v| !v.is_null())
            .map(|v| serde_json::from_value(v).map_err(de::Error::custom))
            .collect(),
        Some(obj @ Value::Object(_)) => serde_json::from_value(obj)
            .map(|one| vec![one])
            .map_err(de::Error::custom),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(other) => Err(de::Error::custom(format!(
            "expected a list of objects, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Name": "Jane Doe",
        "Professional Title": "Data Scientist",
        "Industries": {"Technology": ["Google", "Microsoft"], "Banking": ["ANZ"]},
        "Qualifications": [
            {"Degree": "Master of Data Science", "Institution": "University of Melbourne"}
        ],
        "Summary": "Jane is a data scientist.",
        "Experience": [
            {"Role": "Data Scientist", "Company": "Google", "Start Date": "Jan 2020",
             "End Date": "Present", "Details": "Google is a global tech company.",
             "Key Highlights": ["Led ML research", "Deployed NLP models"]}
        ],
        "Full Work History": [
            {"Company": "Google", "Years": "2020–Present", "Role": "Data Scientist"}
        ]
    }"#;

    #[test]
    fn parses_full_record() {
        let p = ProfileRecord::from_json(SAMPLE).unwrap();
        assert_eq!(p.name, "Jane Doe");
        assert_eq!(p.industries.len(), 2);
        assert_eq!(p.industries.groups()[0].industry, "Technology");
        assert_eq!(p.industries.groups()[0].companies, vec!["Google", "Microsoft"]);
        assert_eq!(p.experience[0].key_highlights.len(), 2);
        assert_eq!(p.full_work_history[0].years, "2020–Present");
        assert!(p.extra.is_empty());
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let p = ProfileRecord::from_json(r#"{"Name": "Solo"}"#).unwrap();
        assert_eq!(p.professional_title, "");
        assert!(p.industries.is_empty());
        assert!(p.qualifications.is_empty());
        assert!(p.experience.is_empty());
        assert!(p.full_work_history.is_empty());

        // Every declared key is present on the way back out.
        let v: Value = serde_json::from_slice(&p.to_json_bytes().unwrap()).unwrap();
        for key in [
            "Name",
            "Professional Title",
            "Industries",
            "Qualifications",
            "Summary",
            "Experience",
            "Full Work History",
        ] {
            assert!(v.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn lenient_values() {
        let p = ProfileRecord::from_json(
            r#"{
                "Name": null,
                "Professional Title": 42,
                "Industries": null,
                "Qualifications": {"Degree": "BSc"},
                "Experience": [{"Role": "Dev", "Key Highlights": "Shipped it"}, null],
                "Full Work History": []
            }"#,
        )
        .unwrap();
        assert_eq!(p.name, "");
        assert_eq!(p.professional_title, "42");
        assert!(p.industries.is_empty());
        assert_eq!(p.qualifications.len(), 1);
        assert_eq!(p.qualifications[0].institution, "");
        assert_eq!(p.experience.len(), 1);
        assert_eq!(p.experience[0].key_highlights, vec!["Shipped it"]);
    }

    #[test]
    fn industry_order_survives_round_trip() {
        let json = r#"{"Industries": {"Zeta": [], "Alpha": ["A"], "Mid": "Solo Co"}}"#;
        let p = ProfileRecord::from_json(json).unwrap();
        let names: Vec<_> = p.industries.groups().iter().map(|g| g.industry.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(p.industries.groups()[2].companies, vec!["Solo Co"]);

        let out = String::from_utf8(p.to_json_bytes().unwrap()).unwrap();
        let zeta = out.find("Zeta").unwrap();
        let alpha = out.find("Alpha").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn extra_keys_are_kept_and_exposed_as_placeholders() {
        let p = ProfileRecord::from_json(
            r#"{"Name": "Jo", "Location": "Perth", "Years Experience": 12, "Skills": ["a"]}"#,
        )
        .unwrap();
        let fields = p.scalar_fields();
        assert_eq!(fields["Name"], "Jo");
        assert_eq!(fields["Location"], "Perth");
        assert_eq!(fields["Years Experience"], "12");
        assert!(!fields.contains_key("Skills"));
        assert_eq!(fields["Summary"], "");
    }

    #[test]
    fn certification_list_detection() {
        let q = Qualification {
            degree: " CERTIFICATIONS ".into(),
            institution: "AWS SA; ; PMP ;ITIL v4".into(),
        };
        assert!(q.is_certification_list());
        assert_eq!(q.certification_items(), vec!["AWS SA", "PMP", "ITIL v4"]);

        let plain = Qualification {
            degree: "Certification in Scrum".into(),
            institution: "Scrum.org".into(),
        };
        assert!(!plain.is_certification_list());
    }

    #[test]
    fn non_ascii_kept_in_encoding() {
        let p = ProfileRecord {
            name: "Zoë Brontë".into(),
            ..Default::default()
        };
        let out = String::from_utf8(p.to_json_bytes().unwrap()).unwrap();
        assert!(out.contains("Zoë Brontë"));
        assert!(out.contains("\n  \"Professional Title\""));
    }

    #[test]
    fn display_name_ignores_blank() {
        let mut p = ProfileRecord::default();
        assert_eq!(p.display_name(), None);
        p.name = "  ".into();
        assert_eq!(p.display_name(), None);
        p.name = " Ann Lee ".into();
        assert_eq!(p.display_name(), Some("Ann Lee"));
    }
}
