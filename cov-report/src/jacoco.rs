// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! JaCoCo XML reports, as written by the JaCoCo Maven and Gradle plugins.
//!
//! Only the structure is decoded. Aggregated counters are kept as reported and
//! never re-derived from the per-line data.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use thiserror::Error;

/// The input is not a JaCoCo report.
///
/// Malformed XML, a schema mismatch and an unknown counter type are not told
/// apart.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid report")]
pub struct InvalidReport;

// <!ELEMENT report (sessioninfo*, (group* | package*), counter*)>
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Report {
    /// Usually the artifact or project name of the Maven/Gradle build.
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "counter", default)]
    pub counters: Vec<Counter>,

    #[serde(rename = "package", default)]
    pub packages: Vec<Package>,
}

impl Report {
    pub fn parse(data: &[u8]) -> Result<Self, InvalidReport> {
        let text = std::str::from_utf8(data).map_err(|_| InvalidReport)?;

        // The deserializer does not look at the name of the root element.
        if !root_is_report(text) {
            return Err(InvalidReport);
        }

        let report: Self = quick_xml::de::from_str(text).map_err(|_| InvalidReport)?;

        // Line numbers are 1-indexed, and each line must have a successor.
        let out_of_range = |line: &Line| line.number == 0 || line.number == u32::MAX;
        if report.source_files().any(|file| file.lines.iter().any(out_of_range)) {
            return Err(InvalidReport);
        }

        Ok(report)
    }

    /// Every source file of every package, in document order.
    pub fn source_files(&self) -> impl Iterator<Item = &SourceFile> {
        self.packages.iter().flat_map(|package| &package.source_files)
    }
}

fn root_is_report(text: &str) -> bool {
    let mut reader = Reader::from_str(text);

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                return element.name().as_ref() == b"report";
            }
            Ok(Event::Eof) | Err(_) => return false,
            Ok(_) => continue,
        }
    }
}

// <!ATTLIST counter type (INSTRUCTION|BRANCH|LINE|COMPLEXITY|METHOD|CLASS) #REQUIRED>
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct Counter {
    #[serde(rename = "@type")]
    pub typ: CounterType,

    #[serde(rename = "@missed")]
    pub missed: u32,

    #[serde(rename = "@covered")]
    pub covered: u32,
}

/// What a [`Counter`] counts. Each type appears at most once per element.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterType {
    /// JVM bytecode instructions.
    Instruction,

    /// Lines holding at least one instruction.
    Line,

    /// Cyclomatic complexity.
    Complexity,

    Method,

    Class,
}

/// A package. Subpackages are separate entries.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Package {
    /// Slash separated, e.g. `dev/mardroemmar/cov/sample`. Empty for the
    /// default package.
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "counter", default)]
    pub counters: Vec<Counter>,

    #[serde(rename = "class", default)]
    pub classes: Vec<Class>,

    #[serde(rename = "sourcefile", default)]
    pub source_files: Vec<SourceFile>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Class {
    /// Fully qualified, slash separated.
    #[serde(rename = "@name")]
    pub name: String,

    /// Bare file name, without the package directory.
    #[serde(rename = "@sourcefilename")]
    pub file_name: String,

    #[serde(rename = "method", default)]
    pub methods: Vec<Method>,

    #[serde(rename = "counter", default)]
    pub counters: Vec<Counter>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Method {
    /// Special names such as `<init>` and `<clinit>` are kept as is.
    #[serde(rename = "@name")]
    pub name: String,

    /// Bytecode descriptor, e.g. `(Ljava/lang/String;)V`.
    #[serde(rename = "@desc")]
    pub descriptor: String,

    /// First line with executable code, not the declaration itself.
    #[serde(rename = "@line")]
    pub declared_line: u32,

    #[serde(rename = "counter", default)]
    pub counters: Vec<Counter>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    /// Bare file name, without the package directory.
    #[serde(rename = "@name")]
    pub name: String,

    #[serde(rename = "line", default)]
    pub lines: Vec<Line>,

    #[serde(rename = "counter", default)]
    pub counters: Vec<Counter>,
}

/// Per-line execution data. Only lines with instructions are listed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Line {
    #[serde(rename = "@nr")]
    pub number: u32,

    #[serde(rename = "@mi")]
    pub missed_instructions: u32,

    /// Instructions executed at least once.
    #[serde(rename = "@ci")]
    pub covered_instructions: u32,

    #[serde(rename = "@mb")]
    pub missed_branches: u32,

    #[serde(rename = "@cb")]
    pub covered_branches: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="sample">
  <sessioninfo id="host-3697872d" start="1741637758834" dump="1741637759283"/>
  <package name="dev/mardroemmar/cov/sample">
    <class name="dev/mardroemmar/cov/sample/Sample" sourcefilename="Sample.java">
      <method name="&lt;init&gt;" desc="()V" line="3">
        <counter type="INSTRUCTION" missed="0" covered="3"/>
        <counter type="METHOD" missed="0" covered="1"/>
      </method>
      <counter type="CLASS" missed="0" covered="1"/>
    </class>
    <sourcefile name="Sample.java">
      <line nr="3" mi="0" ci="3" mb="0" cb="0"/>
      <line nr="7" mi="2" ci="1" mb="1" cb="1"/>
      <counter type="LINE" missed="0" covered="2"/>
    </sourcefile>
    <counter type="COMPLEXITY" missed="1" covered="3"/>
  </package>
  <counter type="INSTRUCTION" missed="2" covered="4"/>
</report>
"#;

    fn counter(typ: CounterType, missed: u32, covered: u32) -> Counter {
        Counter {
            typ,
            missed,
            covered,
        }
    }

    #[test]
    fn parse_minimal_report() -> Result<()> {
        let report = Report::parse(MINIMAL.as_bytes())?;

        let expected = Report {
            name: "sample".into(),
            counters: vec![counter(CounterType::Instruction, 2, 4)],
            packages: vec![Package {
                name: "dev/mardroemmar/cov/sample".into(),
                counters: vec![counter(CounterType::Complexity, 1, 3)],
                classes: vec![Class {
                    name: "dev/mardroemmar/cov/sample/Sample".into(),
                    file_name: "Sample.java".into(),
                    methods: vec![Method {
                        name: "<init>".into(),
                        descriptor: "()V".into(),
                        declared_line: 3,
                        counters: vec![
                            counter(CounterType::Instruction, 0, 3),
                            counter(CounterType::Method, 0, 1),
                        ],
                    }],
                    counters: vec![counter(CounterType::Class, 0, 1)],
                }],
                source_files: vec![SourceFile {
                    name: "Sample.java".into(),
                    lines: vec![
                        Line {
                            number: 3,
                            missed_instructions: 0,
                            covered_instructions: 3,
                            missed_branches: 0,
                            covered_branches: 0,
                        },
                        Line {
                            number: 7,
                            missed_instructions: 2,
                            covered_instructions: 1,
                            missed_branches: 1,
                            covered_branches: 1,
                        },
                    ],
                    counters: vec![counter(CounterType::Line, 0, 2)],
                }],
            }],
        };
        assert_eq!(report, expected);

        Ok(())
    }

    #[test]
    fn parse_empty_report() -> Result<()> {
        let report = Report::parse(br#"<report name="empty"/>"#)?;

        assert_eq!(
            report,
            Report {
                name: "empty".into(),
                ..Report::default()
            }
        );

        Ok(())
    }

    #[test]
    fn unknown_counter_type_is_invalid() {
        let text = MINIMAL.replace(r#"type="COMPLEXITY""#, r#"type="BOGUS""#);
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));

        let text = MINIMAL.replace(r#"type="COMPLEXITY""#, r#"type="complexity""#);
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));
    }

    #[test]
    fn wrong_root_element_is_invalid() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<coverage name="cobertura" version="1.0">
</coverage>"#;
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));
    }

    #[test]
    fn missing_attributes_are_invalid() {
        assert_eq!(Report::parse(b"<report/>"), Err(InvalidReport));

        let text = MINIMAL.replace(r#" mi="2""#, "");
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));
    }

    #[test]
    fn line_zero_is_invalid() {
        let text = MINIMAL.replace(r#"nr="7""#, r#"nr="0""#);
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));
    }

    #[test]
    fn last_representable_line_is_invalid() {
        let text = MINIMAL.replace(r#"nr="7""#, r#"nr="4294967295""#);
        assert_eq!(Report::parse(text.as_bytes()), Err(InvalidReport));

        let text = MINIMAL.replace(r#"nr="7""#, r#"nr="4294967294""#);
        assert!(Report::parse(text.as_bytes()).is_ok());
    }

    #[test]
    fn not_xml_is_invalid() {
        assert_eq!(Report::parse(b"mode: set\n"), Err(InvalidReport));
        assert_eq!(Report::parse(b""), Err(InvalidReport));
        assert_eq!(Report::parse(&[0xff, 0xfe, 0x00, 0x3c]), Err(InvalidReport));
        assert_eq!(
            Report::parse(b"<report name=\"truncated\"><package name=\"a\">"),
            Err(InvalidReport)
        );
    }
}
