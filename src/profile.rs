//! Per-tag structural statistics gathered from example documents
//!
//! Profiles are keyed by tag name, not by path: every instance of `<item>`
//! anywhere in the tree feeds the same [`ElementProfile`], so variation between
//! instances is merged into one summary. A [`ProfileSet`] is built fresh for
//! each inference call and owned by the walk that fills it.

use std::collections::HashMap;

use crate::document::XmlElement;

/// Attribute type written for every inferred attribute
pub const INFERRED_ATTRIBUTE_TYPE: &str = "CDATA";

/// Default declaration written for every inferred attribute
pub const INFERRED_ATTRIBUTE_DEFAULT: &str = "#REQUIRED";

/// Occurrence statistics for one child tag under one parent tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildStats {
    pub name: String,
    /// Total occurrences as a direct child of any instance of the parent
    pub occurrences: usize,
    /// Largest number of occurrences inside a single parent instance
    pub max_per_parent: usize,
    /// Number of parent instances containing this child at least once
    pub parents_containing: usize,
}

/// Cardinality suffix of a child reference in a sequence model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Exactly one, written without a suffix
    One,
    /// `?`
    Optional,
    /// `+`
    OneOrMore,
}

impl Cardinality {
    pub fn symbol(self) -> &'static str {
        match self {
            Cardinality::One => "",
            Cardinality::Optional => "?",
            Cardinality::OneOrMore => "+",
        }
    }
}

/// An inferred attribute declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    pub name: String,
    pub attr_type: String,
    pub default_decl: String,
}

/// Accumulated structure of every element sharing one tag name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementProfile {
    pub name: String,
    /// Number of elements with this tag that were visited
    pub instances: usize,
    /// Child tags in first-seen order
    pub children: Vec<ChildStats>,
    /// Any instance holds non-whitespace text directly
    pub has_text: bool,
    /// Attributes in first-seen order
    pub attributes: Vec<AttributeDecl>,
}

impl ElementProfile {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            instances: 0,
            children: Vec::new(),
            has_text: false,
            attributes: Vec::new(),
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&ChildStats> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Cardinality of a child, judged against this tag's own instance count
    pub fn cardinality(&self, child: &ChildStats) -> Cardinality {
        if child.max_per_parent > 1 {
            Cardinality::OneOrMore
        } else if child.parents_containing < self.instances {
            Cardinality::Optional
        } else {
            Cardinality::One
        }
    }

    fn record_child(&mut self, name: &str, count: usize) {
        match self.children.iter_mut().find(|child| child.name == name) {
            Some(stats) => {
                stats.occurrences += count;
                stats.max_per_parent = stats.max_per_parent.max(count);
                stats.parents_containing += 1;
            }
            None => self.children.push(ChildStats {
                name: name.to_string(),
                occurrences: count,
                max_per_parent: count,
                parents_containing: 1,
            }),
        }
    }

    fn record_attribute(&mut self, name: &str) {
        let decl = AttributeDecl {
            name: name.to_string(),
            attr_type: INFERRED_ATTRIBUTE_TYPE.to_string(),
            default_decl: INFERRED_ATTRIBUTE_DEFAULT.to_string(),
        };
        match self.attributes.iter_mut().find(|attr| attr.name == name) {
            Some(existing) => *existing = decl,
            None => self.attributes.push(decl),
        }
    }
}

/// Name-keyed profiles in first-discovery (pre-order) order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSet {
    profiles: Vec<ElementProfile>,
    index: HashMap<String, usize>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile a single tree
    pub fn from_root(root: &XmlElement) -> Self {
        let mut set = Self::new();
        set.record(root);
        set
    }

    /// Fold another tree into the existing profiles
    pub fn record(&mut self, root: &XmlElement) {
        self.visit(root);
    }

    fn visit(&mut self, element: &XmlElement) {
        let slot = self.slot(&element.name);

        // Per-instance counts in first-seen order, so max_per_parent is exact
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for child in element.child_elements() {
            match counts.iter_mut().find(|(name, _)| *name == child.name) {
                Some((_, count)) => *count += 1,
                None => counts.push((child.name.as_str(), 1)),
            }
        }

        let profile = &mut self.profiles[slot];
        profile.instances += 1;
        profile.has_text |= element.has_direct_text();
        for (name, count) in counts {
            profile.record_child(name, count);
        }
        for name in element.attribute_names() {
            profile.record_attribute(name);
        }

        for child in element.child_elements() {
            self.visit(child);
        }
    }

    fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.index.get(name) {
            return slot;
        }
        let slot = self.profiles.len();
        self.profiles.push(ElementProfile::new(name));
        self.index.insert(name.to_string(), slot);
        slot
    }

    pub fn get(&self, name: &str) -> Option<&ElementProfile> {
        self.index.get(name).map(|&slot| &self.profiles[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
