// src/schema/catalog.rs

use encoding_rs::{Encoding, UTF_8};
use once_cell::sync::Lazy;
use quick_xml::{
    events::{BytesStart, Event},
    Reader,
};
use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace, warn};

use super::types::{ApiConcept, ApiVariable};
use crate::error::{LoadError, Result};

/// `P11. HISPANIC OR LATINO ... [11]` → name, description, variable count.
static CONCEPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(.*)\.(.*)\[(\d+)\]").expect("concept regex"));

static XML_ENCODING_RE: Lazy<BytesRegex> = Lazy::new(|| {
    BytesRegex::new(r#"^\s*<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("xml declaration regex")
});

/// Concepts whose names do not follow the `name. description [count]` form.
struct SpecialConcept {
    prefix: &'static str,
    exact: bool,
    name: &'static str,
    description: &'static str,
    variable_count: usize,
}

static SPECIAL_CONCEPTS: &[SpecialConcept] = &[
    SpecialConcept {
        prefix: "Geographic Characteristics",
        exact: true,
        name: "geo_locations",
        description: "Geographic Characteristics",
        variable_count: 33,
    },
    SpecialConcept {
        prefix: "PCT22A",
        exact: false,
        name: "pct22a",
        description: "GROUP QUARTERS POPULATION BY SEX BY GROUP QUARTERS \
                      TYPE FOR THE POPULATION 18 YEARS AND OVER (WHITE ALONE)",
        variable_count: 21,
    },
    SpecialConcept {
        prefix: "PCT22D",
        exact: false,
        name: "pct22d",
        description: "GROUP QUARTERS POPULATION BY SEX BY GROUP QUARTERS \
                      TYPE FOR THE POPULATION 18 YEARS AND OVER (ASIAN ALONE)",
        variable_count: 21,
    },
];

/// Lower-case table name → concept.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    concepts: HashMap<String, ApiConcept>,
}

impl Catalog {
    pub fn from_concepts(concepts: impl IntoIterator<Item = ApiConcept>) -> Self {
        Self {
            concepts: concepts.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Decode and parse a raw catalog document.
    #[instrument(level = "info", skip(body), fields(bytes = body.len()))]
    pub fn parse(body: &[u8]) -> Result<Self> {
        let text = decode_catalog(body)?;
        let catalog = Self::from_concepts(parse_concepts(&text)?);
        info!(concepts = catalog.len(), "parsed census API documentation");
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&ApiConcept> {
        self.concepts.get(name)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

/// Decode using the charset named in the XML declaration, UTF-8 if none.
pub fn decode_catalog(body: &[u8]) -> Result<String> {
    let head = &body[..body.len().min(256)];
    let encoding = match XML_ENCODING_RE.captures(head) {
        Some(caps) => Encoding::for_label(&caps[1]).ok_or_else(|| {
            LoadError::drift(
                String::from_utf8_lossy(&caps[1]).into_owned(),
                "unknown catalog character set",
            )
        })?,
        None => UTF_8,
    };
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        warn!(encoding = used.name(), "catalog contained undecodable bytes");
    }
    debug!(encoding = used.name(), "decoded catalog");
    Ok(text.into_owned())
}

/// Resolve a concept's raw catalog name into table name, description and
/// declared variable count, then check the variables against that count.
pub fn resolve_concept(raw_name: &str, variables: Vec<ApiVariable>) -> Result<ApiConcept> {
    let (name, description, variable_count) = match CONCEPT_RE.captures(raw_name) {
        Some(caps) => {
            let count = caps[3].parse::<usize>().map_err(|e| {
                LoadError::drift(raw_name, format!("bad variable count: {}", e))
            })?;
            (
                caps[1].trim().to_lowercase(),
                caps[2].trim().to_string(),
                count,
            )
        }
        None => {
            let special = SPECIAL_CONCEPTS
                .iter()
                .find(|s| {
                    if s.exact {
                        raw_name == s.prefix
                    } else {
                        raw_name.starts_with(s.prefix)
                    }
                })
                .ok_or_else(|| LoadError::drift(raw_name, "concept does not match regex"))?;
            (
                special.name.to_string(),
                special.description.to_string(),
                special.variable_count,
            )
        }
    };

    if variables.len() != variable_count {
        return Err(LoadError::drift(
            name,
            format!(
                "mismatched variable count: {} declared, {} listed",
                variable_count,
                variables.len()
            ),
        ));
    }
    trace!(%name, variables = variable_count, "resolved concept");
    Ok(ApiConcept {
        name,
        description,
        variable_count,
        variables,
    })
}

fn name_attr(e: &BytesStart<'_>, element: &str) -> Result<String> {
    let attr = e
        .try_get_attribute("name")
        .map_err(quick_xml::Error::from)?
        .ok_or_else(|| LoadError::drift(element, "element has no name attribute"))?;
    Ok(attr
        .unescape_value()
        .map_err(quick_xml::Error::from)?
        .into_owned())
}

struct OpenConcept {
    raw_name: String,
    variables: Vec<ApiVariable>,
}

/// Walk `<concept name=..><variable name=..>description</variable>..</concept>`.
pub fn parse_concepts(text: &str) -> Result<Vec<ApiConcept>> {
    let mut reader = Reader::from_str(text);
    let mut concepts = Vec::new();
    let mut concept: Option<OpenConcept> = None;
    let mut variable: Option<ApiVariable> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"concept" => {
                    concept = Some(OpenConcept {
                        raw_name: name_attr(&e, "concept")?,
                        variables: Vec::new(),
                    })
                }
                b"variable" => {
                    variable = Some(ApiVariable {
                        name: name_attr(&e, "variable")?.to_lowercase(),
                        description: String::new(),
                    })
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"concept" => {
                    concepts.push(resolve_concept(&name_attr(&e, "concept")?, Vec::new())?)
                }
                b"variable" => {
                    if let Some(c) = concept.as_mut() {
                        c.variables.push(ApiVariable {
                            name: name_attr(&e, "variable")?.to_lowercase(),
                            description: String::new(),
                        });
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(v) = variable.as_mut() {
                    v.description
                        .push_str(&t.unescape().map_err(quick_xml::Error::from)?);
                }
            }
            Event::CData(c) => {
                if let Some(v) = variable.as_mut() {
                    v.description
                        .push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"variable" => {
                    if let (Some(mut v), Some(c)) = (variable.take(), concept.as_mut()) {
                        v.description = v.description.trim().to_string();
                        c.variables.push(v);
                    }
                }
                b"concept" => {
                    if let Some(c) = concept.take() {
                        concepts.push(resolve_concept(&c.raw_name, c.variables)?);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(concepts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(prefix: &str, n: usize) -> Vec<ApiVariable> {
        (1..=n)
            .map(|i| ApiVariable {
                name: format!("{}{:04}", prefix, i),
                description: String::new(),
            })
            .collect()
    }

    fn concept_xml(name: &str, prefix: &str, n: usize) -> String {
        let mut s = format!("<concept name=\"{}\">", name);
        for i in 1..=n {
            s.push_str(&format!(
                "<variable name=\"{}{:04}\">Var {}</variable>",
                prefix, i, i
            ));
        }
        s.push_str("</concept>");
        s
    }

    #[test]
    fn test_regular_concept_resolves() {
        let c = resolve_concept("P11. HISPANIC OR LATINO [11]", vars("P011", 11)).unwrap();
        assert_eq!(c.name, "p11");
        assert_eq!(c.description, "HISPANIC OR LATINO");
        assert_eq!(c.variable_count, 11);
    }

    #[test]
    fn test_count_mismatch_is_fatal() {
        let err = resolve_concept("P11. HISPANIC OR LATINO [11]", vars("P011", 10)).unwrap_err();
        match err {
            LoadError::SchemaDrift { identifier, .. } => assert_eq!(identifier, "p11"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_special_cases_and_unknown_names() {
        let geo = resolve_concept("Geographic Characteristics", vars("G", 33)).unwrap();
        assert_eq!(geo.name, "geo_locations");

        let pct = resolve_concept("PCT22A GROUP QUARTERS (WHITE ALONE)", vars("PCT022A", 21))
            .unwrap();
        assert_eq!(pct.name, "pct22a");
        assert!(pct.description.ends_with("(WHITE ALONE)"));

        assert!(resolve_concept("Something New", vec![]).is_err());
        // exact match only for the geographic concept
        assert!(resolve_concept("Geographic Characteristics v2", vars("G", 33)).is_err());
    }

    #[test]
    fn test_parse_document() {
        let doc = format!(
            "<?xml version=\"1.0\"?><apivariables>{}{}</apivariables>",
            concept_xml("P1. TOTAL POPULATION [1]", "P001", 1),
            concept_xml("P11. HISPANIC OR LATINO [11]", "P011", 11),
        );
        let catalog = Catalog::parse(doc.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        let p11 = catalog.get("p11").unwrap();
        assert_eq!(p11.variables.len(), 11);
        assert_eq!(p11.variables[0].name, "p0110001");
        assert_eq!(p11.variables[0].description, "Var 1");
        assert!(catalog.get("P11").is_none());
    }

    #[test]
    fn test_latin1_catalog_is_decoded() {
        let mut body = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<apivariables>\
            <concept name=\"P1. TOTAL POPULATION [1]\">\
            <variable name=\"P0010001\">Poblaci"
            .to_vec();
        body.push(0xf3);
        body.extend_from_slice(b"n total</variable></concept></apivariables>");

        let catalog = Catalog::parse(&body).unwrap();
        assert_eq!(
            catalog.get("p1").unwrap().variables[0].description,
            "Población total"
        );
    }

    #[test]
    fn test_unknown_charset_is_rejected() {
        let body = b"<?xml version=\"1.0\" encoding=\"no-such-charset\"?><apivariables/>";
        assert!(decode_catalog(body).is_err());
    }

    #[test]
    fn test_mismatch_inside_document_stops_parse() {
        let doc = format!(
            "<apivariables>{}</apivariables>",
            concept_xml("P11. HISPANIC OR LATINO [11]", "P011", 9)
        );
        assert!(Catalog::parse(doc.as_bytes()).is_err());
    }
}
