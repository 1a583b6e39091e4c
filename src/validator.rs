//! Checks a document tree against a [`RuleTable`]
//!
//! Every violation becomes one human-readable diagnostic and the walk always
//! continues into children, so one bad element never hides problems deeper in
//! the tree. The only early exit is an undeclared root element.
//!
//! Element-content models are checked for membership only: each child must be
//! declared somewhere in the DTD. Sequence order and cardinality written in the
//! raw model text are not verified.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{Document, XmlElement};
use crate::dtd_parser::{ContentModel, RuleTable};
use crate::error::Result;

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    UndefinedRoot { element: String },
    UndefinedElement { element: String },
    ContentInEmpty { element: String },
    ChildInTextOnly { element: String },
    NotAllowedInMixed { child: String, parent: String },
    UndefinedChild { child: String, parent: String },
    MissingRequiredAttribute { attribute: String, element: String },
    UndefinedAttribute { attribute: String, element: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UndefinedRoot { element } => {
                write!(f, "Root element <{}> is not defined in the DTD.", element)
            }
            Violation::UndefinedElement { element } => {
                write!(f, "Element <{}> is not defined in the DTD.", element)
            }
            Violation::ContentInEmpty { element } => write!(
                f,
                "Element <{}> should be empty but contains content.",
                element
            ),
            Violation::ChildInTextOnly { element } => write!(
                f,
                "Element <{}> should only contain text but has child elements.",
                element
            ),
            Violation::NotAllowedInMixed { child, parent } => write!(
                f,
                "Element <{}> is not allowed in mixed content of <{}>.",
                child, parent
            ),
            Violation::UndefinedChild { child, parent } => write!(
                f,
                "Child element <{}> of <{}> is not defined in the DTD.",
                child, parent
            ),
            Violation::MissingRequiredAttribute { attribute, element } => write!(
                f,
                "Required attribute \"{}\" missing from element <{}>.",
                attribute, element
            ),
            Violation::UndefinedAttribute { attribute, element } => write!(
                f,
                "Attribute \"{}\" on element <{}> is not defined in the DTD.",
                attribute, element
            ),
        }
    }
}

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Exactly `errors.is_empty()`
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Element and attribute checker bound to one rule table
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    rules: &'r RuleTable,
}

impl<'r> Validator<'r> {
    pub fn new(rules: &'r RuleTable) -> Self {
        Self { rules }
    }

    pub fn validate(&self, document: &Document) -> ValidationReport {
        ValidationReport::from_errors(self.validate_element(document.root()))
    }

    /// Diagnostics for the tree rooted at `root`, in pre-order
    pub fn validate_element(&self, root: &XmlElement) -> Vec<String> {
        self.violations(root)
            .into_iter()
            .map(|violation| violation.to_string())
            .collect()
    }

    /// Structured form of [`Validator::validate_element`]
    pub fn violations(&self, root: &XmlElement) -> Vec<Violation> {
        let mut found = Vec::new();
        if !self.rules.is_declared(&root.name) {
            found.push(Violation::UndefinedRoot {
                element: root.name.clone(),
            });
            return found;
        }
        self.check_element(root, false, &mut found);
        found
    }

    /// `reported` is set when the parent already flagged this element as undeclared
    fn check_element(&self, element: &XmlElement, reported: bool, found: &mut Vec<Violation>) {
        let mut flagged_children: Vec<&XmlElement> = Vec::new();

        match self.rules.content_model(&element.name) {
            None => {
                if !reported {
                    found.push(Violation::UndefinedElement {
                        element: element.name.clone(),
                    });
                }
            }
            Some(model) => {
                self.check_content(element, model, &mut flagged_children, found);
                self.check_attributes(element, found);
            }
        }

        for child in element.child_elements() {
            let reported = flagged_children.iter().any(|c| std::ptr::eq(*c, child));
            self.check_element(child, reported, found);
        }
    }

    fn check_content<'e>(
        &self,
        element: &'e XmlElement,
        model: &ContentModel,
        flagged_children: &mut Vec<&'e XmlElement>,
        found: &mut Vec<Violation>,
    ) {
        match model {
            ContentModel::Empty => {
                if element.has_meaningful_content() {
                    found.push(Violation::ContentInEmpty {
                        element: element.name.clone(),
                    });
                }
            }
            ContentModel::PcdataOnly => {
                if element.child_elements().next().is_some() {
                    found.push(Violation::ChildInTextOnly {
                        element: element.name.clone(),
                    });
                }
            }
            ContentModel::Mixed { allowed_children } => {
                for child in element.child_elements() {
                    if !allowed_children.iter().any(|name| *name == child.name) {
                        found.push(Violation::NotAllowedInMixed {
                            child: child.name.clone(),
                            parent: element.name.clone(),
                        });
                    }
                }
            }
            ContentModel::Children { .. } => {
                for child in element.child_elements() {
                    if !self.rules.is_declared(&child.name) {
                        found.push(Violation::UndefinedChild {
                            child: child.name.clone(),
                            parent: element.name.clone(),
                        });
                        flagged_children.push(child);
                    }
                }
            }
        }
    }

    /// Elements without an ATTLIST accept any attributes
    fn check_attributes(&self, element: &XmlElement, found: &mut Vec<Violation>) {
        let Some(table) = self.rules.attributes(&element.name) else {
            return;
        };

        for rule in table.required() {
            if !element.has_attribute(&rule.name) {
                found.push(Violation::MissingRequiredAttribute {
                    attribute: rule.name.clone(),
                    element: element.name.clone(),
                });
            }
        }

        for name in element.attribute_names() {
            if !table.contains(name) {
                found.push(Violation::UndefinedAttribute {
                    attribute: name.to_string(),
                    element: element.name.clone(),
                });
            }
        }
    }
}

/// Validate a tree against a rule table
pub fn validate(root: &XmlElement, rules: &RuleTable) -> Vec<String> {
    Validator::new(rules).validate_element(root)
}

/// Parse both texts and validate the document against the DTD
///
/// Malformed markup is an error, not a diagnostic. DTD text never fails to
/// parse; unrecognised declarations are dropped.
pub fn debug_xml(xml: &str, dtd: &str) -> Result<ValidationReport> {
    let document = Document::parse(xml)?;
    let rules = RuleTable::parse(dtd);
    Ok(Validator::new(&rules).validate(&document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(xml: &str, dtd: &str) -> Vec<String> {
        debug_xml(xml, dtd).unwrap().errors
    }

    const NOTE_DTD: &str = "<!ELEMENT note (to, from)>\n\
                            <!ELEMENT to (#PCDATA)>\n\
                            <!ELEMENT from (#PCDATA)>";

    #[test]
    fn test_valid_document() {
        let report = debug_xml("<note><to>T</to><from>J</from></note>", NOTE_DTD).unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_undefined_root_short_circuits() {
        let errors = check("<memo><cc/></memo>", NOTE_DTD);
        assert_eq!(
            errors,
            vec!["Root element <memo> is not defined in the DTD.".to_string()]
        );
    }

    #[test]
    fn test_undeclared_child_reported_once() {
        let errors = check("<note><to>T</to><cc>x</cc></note>", NOTE_DTD);
        assert_eq!(
            errors,
            vec!["Child element <cc> of <note> is not defined in the DTD.".to_string()]
        );
    }

    #[test]
    fn test_undefined_element_still_recurses() {
        let dtd = "<!ELEMENT r (#PCDATA | x)*>\n<!ELEMENT y EMPTY>";
        let errors = check("<r><x><y>text</y></x></r>", dtd);
        assert_eq!(
            errors,
            vec![
                "Element <x> is not defined in the DTD.".to_string(),
                "Element <y> should be empty but contains content.".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_model() {
        let dtd = "<!ELEMENT br EMPTY>";
        assert!(check("<br/>", dtd).is_empty());
        assert!(check("<br>  <!-- c -->  </br>", dtd).is_empty());
        assert_eq!(
            check("<br>x</br>", dtd),
            vec!["Element <br> should be empty but contains content.".to_string()]
        );
    }

    #[test]
    fn test_pcdata_model() {
        let dtd = "<!ELEMENT t (#PCDATA)>";
        assert!(check("<t>anything</t>", dtd).is_empty());
        let errors = check("<t>a<t/></t>", dtd);
        assert_eq!(
            errors,
            vec!["Element <t> should only contain text but has child elements.".to_string()]
        );
    }

    #[test]
    fn test_mixed_model() {
        let dtd = "<!ELEMENT p (#PCDATA | b)*>\n<!ELEMENT b (#PCDATA)>\n<!ELEMENT i (#PCDATA)>";
        let errors = check("<p>x <b>1</b> <i>2</i> <i>3</i></p>", dtd);
        assert_eq!(
            errors,
            vec![
                "Element <i> is not allowed in mixed content of <p>.".to_string(),
                "Element <i> is not allowed in mixed content of <p>.".to_string(),
            ]
        );
    }

    #[test]
    fn test_children_model_checks_membership_only() {
        // Order and cardinality are not enforced
        let errors = check("<note><from>J</from><from>K</from></note>", NOTE_DTD);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_required_attribute() {
        let dtd = format!("{}\n<!ATTLIST note id CDATA #REQUIRED>", NOTE_DTD);
        let errors = check("<note><to>T</to><from>J</from></note>", &dtd);
        assert_eq!(
            errors,
            vec!["Required attribute \"id\" missing from element <note>.".to_string()]
        );
    }

    #[test]
    fn test_implied_attribute_may_be_absent() {
        let dtd = format!("{}\n<!ATTLIST note id CDATA #IMPLIED>", NOTE_DTD);
        assert!(check("<note><to>T</to></note>", &dtd).is_empty());
    }

    #[test]
    fn test_undefined_attribute() {
        let dtd = format!("{}\n<!ATTLIST note id CDATA #REQUIRED>", NOTE_DTD);
        let errors = check(r#"<note id="1" lang="en"><to>T</to></note>"#, &dtd);
        assert_eq!(
            errors,
            vec!["Attribute \"lang\" on element <note> is not defined in the DTD.".to_string()]
        );
    }

    #[test]
    fn test_attributes_unchecked_without_attlist() {
        let dtd = format!("{}\n<!ATTLIST note id CDATA #REQUIRED>", NOTE_DTD);
        assert!(check(r#"<note id="1"><to lang="en">T</to></note>"#, &dtd).is_empty());
        assert!(check(r#"<note id="1"/>"#, NOTE_DTD).is_empty());
    }

    #[test]
    fn test_violations_are_structured() {
        let rules = RuleTable::parse(NOTE_DTD);
        let doc = Document::parse("<note><x/></note>").unwrap();
        let violations = Validator::new(&rules).violations(doc.root());
        assert_eq!(
            violations,
            vec![Violation::UndefinedChild {
                child: "x".to_string(),
                parent: "note".to_string(),
            }]
        );
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        let err = debug_xml("<note><to>T</note>", NOTE_DTD).unwrap_err();
        assert!(err.is_input_rejection());
    }

    #[test]
    fn test_validation_is_repeatable() {
        let rules = RuleTable::parse(NOTE_DTD);
        let doc = Document::parse("<note a=\"1\"><q/><to><z/></to></note>").unwrap();
        let first = validate(doc.root(), &rules);
        let second = validate(doc.root(), &rules);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
