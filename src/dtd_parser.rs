//! Pattern-based DTD reader
//!
//! This is deliberately not a conformance parser. Declarations are pulled out
//! of the text with regular expressions and anything that does not have the
//! expected shape is skipped without complaint. A tag whose declaration was
//! skipped simply has no rule, which the validator then reports on its own.
//!
//! Element-content models such as `(a, b?, c+)` are kept as raw text in
//! [`ContentModel::Children`]; only their shape is classified here.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Cached regex for `<!ELEMENT name model>`
static ELEMENT_DECL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Cached regex for `<!ATTLIST name ...>`
static ATTLIST_DECL_REGEX: OnceLock<Regex> = OnceLock::new();

/// Cached regex for one `name type default` triple inside an ATTLIST
///
/// `#FIXED "value"` defaults are four tokens and throw the triple scan out of step.
static ATTRIBUTE_DEF_REGEX: OnceLock<Regex> = OnceLock::new();

/// Cached regex for `<!-- ... -->`
static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();

fn element_decl_regex() -> &'static Regex {
    ELEMENT_DECL_REGEX.get_or_init(|| {
        Regex::new(r"<!ELEMENT\s+([^\s>]+)\s+([^>]+)>")
            .expect("Failed to compile ELEMENT declaration regex")
    })
}

fn attlist_decl_regex() -> &'static Regex {
    ATTLIST_DECL_REGEX.get_or_init(|| {
        Regex::new(r"<!ATTLIST\s+([^\s>]+)([^>]*)>")
            .expect("Failed to compile ATTLIST declaration regex")
    })
}

fn attribute_def_regex() -> &'static Regex {
    ATTRIBUTE_DEF_REGEX.get_or_init(|| {
        Regex::new(r"\s+([^\s>]+)\s+([^\s>#]+)\s+(#\w+|[^\s>]+)")
            .expect("Failed to compile attribute definition regex")
    })
}

fn comment_regex() -> &'static Regex {
    COMMENT_REGEX.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->").expect("Failed to compile comment regex")
    })
}

/// What an element may contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentModel {
    /// `EMPTY`
    Empty,
    /// `(#PCDATA)`
    PcdataOnly,
    /// `(#PCDATA | a | b)*`
    Mixed { allowed_children: Vec<String> },
    /// Any other model, kept unparsed
    Children { raw: String },
}

impl ContentModel {
    /// Classify content-model text by its shape
    pub fn classify(text: &str) -> Self {
        let text = text.trim();

        if text == "EMPTY" {
            return ContentModel::Empty;
        }
        if text == "(#PCDATA)" {
            return ContentModel::PcdataOnly;
        }
        if let Some(inner) = text
            .strip_prefix("(#PCDATA")
            .and_then(|rest| rest.strip_suffix(")*"))
        {
            let allowed_children = inner
                .split('|')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            return ContentModel::Mixed { allowed_children };
        }

        ContentModel::Children {
            raw: text.to_string(),
        }
    }
}

/// A declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRule {
    pub name: String,
    pub attr_type: String,
    pub default_decl: String,
}

impl AttributeRule {
    pub fn is_required(&self) -> bool {
        self.default_decl == "#REQUIRED"
    }
}

/// Attribute rules of one element in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTable {
    rules: Vec<AttributeRule>,
}

impl AttributeTable {
    pub fn get(&self, name: &str) -> Option<&AttributeRule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Add a rule, replacing an earlier one with the same name in place
    pub fn insert(&mut self, rule: AttributeRule) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeRule> {
        self.rules.iter()
    }

    pub fn required(&self) -> impl Iterator<Item = &AttributeRule> {
        self.rules.iter().filter(|rule| rule.is_required())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Element and attribute rules extracted from DTD text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub elements: BTreeMap<String, ContentModel>,
    pub attributes: BTreeMap<String, AttributeTable>,
}

impl RuleTable {
    /// Extract every recognisable declaration; never fails
    pub fn parse(dtd: &str) -> Self {
        let text = comment_regex().replace_all(dtd, "");
        let mut rules = RuleTable::default();

        for caps in element_decl_regex().captures_iter(&text) {
            rules
                .elements
                .insert(caps[1].to_string(), ContentModel::classify(&caps[2]));
        }

        for caps in attlist_decl_regex().captures_iter(&text) {
            let table = rules.attributes.entry(caps[1].to_string()).or_default();
            for def in attribute_def_regex().captures_iter(&caps[2]) {
                table.insert(AttributeRule {
                    name: def[1].to_string(),
                    attr_type: def[2].to_string(),
                    default_decl: def[3].to_string(),
                });
            }
        }

        rules
    }

    pub fn content_model(&self, element: &str) -> Option<&ContentModel> {
        self.elements.get(element)
    }

    pub fn is_declared(&self, element: &str) -> bool {
        self.elements.contains_key(element)
    }

    pub fn attributes(&self, element: &str) -> Option<&AttributeTable> {
        self.attributes.get(element)
    }

    pub fn element_names(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }
}

/// Parse DTD text into a rule table
pub fn parse_dtd(dtd: &str) -> RuleTable {
    RuleTable::parse(dtd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_content_models() {
        assert_eq!(ContentModel::classify("EMPTY"), ContentModel::Empty);
        assert_eq!(
            ContentModel::classify(" (#PCDATA) "),
            ContentModel::PcdataOnly
        );
        assert_eq!(
            ContentModel::classify("(#PCDATA | b | i)*"),
            ContentModel::Mixed {
                allowed_children: vec!["b".to_string(), "i".to_string()]
            }
        );
        assert_eq!(
            ContentModel::classify("(#PCDATA|em)*"),
            ContentModel::Mixed {
                allowed_children: vec!["em".to_string()]
            }
        );
        assert_eq!(
            ContentModel::classify("(#PCDATA)*"),
            ContentModel::Mixed {
                allowed_children: vec![]
            }
        );
        assert_eq!(
            ContentModel::classify("(to, from?, body+)"),
            ContentModel::Children {
                raw: "(to, from?, body+)".to_string()
            }
        );
    }

    #[test]
    fn test_parse_elements_and_attlists() {
        let dtd = r#"<?xml version="1.0" encoding="UTF-8"?>
<!ELEMENT note (to | from)*>
<!ELEMENT to (#PCDATA)>
<!ELEMENT from (#PCDATA)>
<!ATTLIST note
    id CDATA #REQUIRED
    lang CDATA #IMPLIED
>
"#;
        let rules = RuleTable::parse(dtd);

        assert_eq!(rules.elements.len(), 3);
        assert_eq!(
            rules.content_model("note"),
            Some(&ContentModel::Children {
                raw: "(to | from)*".to_string()
            })
        );
        assert_eq!(rules.content_model("to"), Some(&ContentModel::PcdataOnly));

        let note_attrs = rules.attributes("note").unwrap();
        assert_eq!(note_attrs.len(), 2);
        assert!(note_attrs.get("id").unwrap().is_required());
        assert!(!note_attrs.get("lang").unwrap().is_required());
        let required: Vec<&str> = note_attrs.required().map(|r| r.name.as_str()).collect();
        assert_eq!(required, vec!["id"]);
    }

    #[test]
    fn test_single_line_attlist() {
        let rules = RuleTable::parse("<!ATTLIST img src CDATA #REQUIRED alt CDATA #REQUIRED>");
        let img = rules.attributes("img").unwrap();
        let names: Vec<&str> = img.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["src", "alt"]);
        assert!(!rules.is_declared("img"));
    }

    #[test]
    fn test_fixed_default_is_not_understood() {
        let rules = RuleTable::parse(r#"<!ATTLIST a x CDATA #FIXED "v" y CDATA #REQUIRED>"#);
        let a = rules.attributes("a").unwrap();
        assert_eq!(a.get("x").unwrap().default_decl, "#FIXED");
        assert!(!a.get("x").unwrap().is_required());
        assert!(a.get("y").is_none());
        assert_eq!(a.required().count(), 0);
    }

    #[test]
    fn test_names_with_punctuation() {
        let rules = RuleTable::parse(
            "<!ELEMENT my-item.v2 (#PCDATA)>\n<!ATTLIST my-item.v2 xml:lang CDATA #REQUIRED>",
        );
        assert!(rules.is_declared("my-item.v2"));
        assert!(rules.attributes("my-item.v2").unwrap().contains("xml:lang"));
    }

    #[test]
    fn test_malformed_declarations_are_skipped() {
        let rules = RuleTable::parse(
            "<!ELEMENT>\n<!ELEMENT ok EMPTY>\n<!ELEMENTbroken (#PCDATA)>\nrandom text",
        );
        let names: Vec<&str> = rules.element_names().collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn test_comments_are_ignored() {
        let rules = RuleTable::parse("<!-- <!ELEMENT hidden EMPTY> -->\n<!ELEMENT shown EMPTY>");
        assert!(!rules.is_declared("hidden"));
        assert!(rules.is_declared("shown"));
    }

    #[test]
    fn test_later_declarations_win() {
        let rules = RuleTable::parse(
            "<!ELEMENT a EMPTY>\n<!ELEMENT a (#PCDATA)>\n\
             <!ATTLIST a x CDATA #REQUIRED>\n<!ATTLIST a x CDATA #IMPLIED>",
        );
        assert_eq!(rules.content_model("a"), Some(&ContentModel::PcdataOnly));
        assert!(!rules.attributes("a").unwrap().get("x").unwrap().is_required());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let dtd = "<!ELEMENT a (b, c?)>\n<!ELEMENT b EMPTY>\n<!ATTLIST b k CDATA #REQUIRED>";
        assert_eq!(parse_dtd(dtd), parse_dtd(dtd));
    }

    #[test]
    fn test_rule_table_serializes() {
        let rules = RuleTable::parse("<!ELEMENT a (#PCDATA | b)*>\n<!ELEMENT b EMPTY>");
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json["elements"]["b"]["type"], "empty");
        assert_eq!(json["elements"]["a"]["allowed_children"][0], "b");
    }
}
