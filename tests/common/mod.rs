//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const NOTE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<note>
    <to>Tove</to>
    <from>Jani</from>
    <heading>Reminder</heading>
    <body>Don't forget me this weekend!</body>
</note>
"#;

/// Mixed content, empty elements and attributes in one document
pub const CATALOG_XML: &str = r#"<catalog version="2">
    <!-- two books -->
    <book id="b1" lang="en">
        <title>Rust in <em>Action</em></title>
        <author>Tim</author>
        <cover/>
    </book>
    <book id="b2" lang="de">
        <title>Plain</title>
        <author>A</author>
        <author>B</author>
        <price currency="EUR">12.50</price>
        <cover/>
    </book>
</catalog>
"#;

pub const NOTE_DTD: &str = "<!ELEMENT note (to, from)>\n\
                            <!ELEMENT to (#PCDATA)>\n\
                            <!ELEMENT from (#PCDATA)>\n";

/// Temporary directory populated with `(relative path, contents)` pairs
pub fn create_corpus(files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }
    temp_dir
}

pub fn path_in(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

/// Run the built binary from inside `cwd` so no stray config file is picked up
pub fn run_cli(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dtd-infer"))
        .args(args)
        .current_dir(cwd)
        .env("XDG_CONFIG_HOME", cwd)
        .env_remove("DTD_INFER_MODE")
        .env_remove("DTD_INFER_FORMAT")
        .env_remove("DTD_INFER_QUIET")
        .env_remove("DTD_INFER_VERBOSE")
        .output()
        .expect("Failed to execute dtd-infer")
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}
