//! # dtd-infer Library
//!
//! Infers a Document Type Definition from example XML documents and validates
//! XML documents against a DTD.
//!
//! ```
//! use dtd_infer::{debug_xml, infer_dtd};
//!
//! let xml = "<note><to>Tove</to><from>Jani</from></note>";
//! let dtd = infer_dtd(xml, "strict").unwrap();
//! assert!(dtd.contains("<!ELEMENT note (to, from)>"));
//!
//! let report = debug_xml(xml, &dtd).unwrap();
//! assert!(report.valid);
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod dtd_parser;
pub mod engine;
pub mod error;
pub mod error_reporter;
pub mod file_discovery;
pub mod inferrer;
pub mod output;
pub mod profile;
pub mod validator;

pub use cli::{Cli, OutputFormat, VerbosityLevel};
pub use config::{Config, ConfigError, ConfigManager};
pub use document::{Document, InputCheck, ParseOptions, XmlElement, XmlNode, check_input};
pub use dtd_parser::{AttributeRule, AttributeTable, ContentModel, RuleTable, parse_dtd};
pub use engine::{
    EngineConfig, FileValidationResult, ProgressCallback, ValidationEngine, ValidationPhase,
    ValidationProgress, ValidationResults, ValidationStatus,
};
pub use error::{DtdError, Result};
pub use error_reporter::ErrorReporter;
pub use file_discovery::FileDiscovery;
pub use inferrer::{InferenceMode, Inferrer, infer_dtd};
pub use output::Output;
pub use profile::{Cardinality, ElementProfile, ProfileSet};
pub use validator::{ValidationReport, Validator, Violation, debug_xml, validate};
