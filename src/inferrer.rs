//! DTD inference from example documents
//!
//! Two rendering policies are supported:
//! - **normal**: element-only content becomes a repeated choice `(a | b)*`
//! - **strict**: element-only content becomes an ordered sequence with
//!   cardinality suffixes `(a, b?, c+)`
//!
//! Leaf and mixed content render the same way in both modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{DtdError, Result};
use crate::profile::{ElementProfile, ProfileSet};

/// Text declaration written at the top of every generated DTD
pub const TEXT_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Content-model rendering policy
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InferenceMode {
    /// Unordered repeated choice for element content
    #[default]
    Normal,
    /// Ordered sequence with inferred cardinality
    Strict,
}

impl FromStr for InferenceMode {
    type Err = DtdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(InferenceMode::Normal),
            "strict" => Ok(InferenceMode::Strict),
            _ => Err(DtdError::InvalidMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceMode::Normal => f.write_str("normal"),
            InferenceMode::Strict => f.write_str("strict"),
        }
    }
}

/// Renders DTD text from example documents
#[derive(Debug, Clone, Copy, Default)]
pub struct Inferrer {
    mode: InferenceMode,
}

impl Inferrer {
    pub fn new(mode: InferenceMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> InferenceMode {
        self.mode
    }

    /// Infer a DTD from one document
    pub fn infer(&self, document: &Document) -> String {
        self.render(&ProfileSet::from_root(document.root()))
    }

    /// Infer a single DTD covering several documents
    pub fn infer_all<'a, I>(&self, documents: I) -> Result<String>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut profiles = ProfileSet::new();
        for document in documents {
            profiles.record(document.root());
        }
        if profiles.is_empty() {
            return Err(DtdError::invalid_input(
                "at least one example document is required",
            ));
        }
        Ok(self.render(&profiles))
    }

    /// Render collected profiles as declaration text
    pub fn render(&self, profiles: &ProfileSet) -> String {
        let mut dtd = String::new();
        dtd.push_str(TEXT_DECLARATION);
        dtd.push('\n');

        for profile in profiles.iter() {
            dtd.push_str(&format!(
                "<!ELEMENT {} {}>\n",
                profile.name,
                self.content_model(profile)
            ));

            if !profile.attributes.is_empty() {
                dtd.push_str(&format!("<!ATTLIST {}\n", profile.name));
                for attr in &profile.attributes {
                    dtd.push_str(&format!(
                        "    {} {} {}\n",
                        attr.name, attr.attr_type, attr.default_decl
                    ));
                }
                dtd.push_str(">\n");
            }
        }

        dtd
    }

    /// Content-model text for one profile
    pub fn content_model(&self, profile: &ElementProfile) -> String {
        if !profile.has_children() {
            return if profile.has_text {
                "(#PCDATA)".to_string()
            } else {
                "EMPTY".to_string()
            };
        }

        if profile.has_text {
            let mut parts = vec!["#PCDATA"];
            parts.extend(profile.children.iter().map(|child| child.name.as_str()));
            return format!("({})*", parts.join(" | "));
        }

        match self.mode {
            InferenceMode::Normal => {
                let names: Vec<&str> = profile
                    .children
                    .iter()
                    .map(|child| child.name.as_str())
                    .collect();
                format!("({})*", names.join(" | "))
            }
            InferenceMode::Strict => {
                let items: Vec<String> = profile
                    .children
                    .iter()
                    .map(|child| {
                        format!("{}{}", child.name, profile.cardinality(child).symbol())
                    })
                    .collect();
                format!("({})", items.join(", "))
            }
        }
    }
}

/// Parse markup text and infer a DTD under the named mode
///
/// Fails with an input error when the markup is not well-formed or the mode
/// is neither `normal` nor `strict`.
pub fn infer_dtd(xml: &str, mode: &str) -> Result<String> {
    let mode = InferenceMode::from_str(mode)?;
    let document = Document::parse(xml)?;
    Ok(Inferrer::new(mode).infer(&document))
}
