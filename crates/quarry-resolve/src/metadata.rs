//! `maven-metadata.xml`: the per-artifact version index of a Maven repository.

use crate::ResolveError;
use quarry_schema::MavenVersion;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write as _;

pub const METADATA_FILE: &str = "maven-metadata.xml";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MavenMetadata {
    pub group_id: String,
    pub artifact_id: String,
    pub latest: Option<String>,
    pub release: Option<String>,
    /// Versions in document order.
    pub versions: Vec<String>,
}

impl MavenMetadata {
    pub fn new(group_id: &str, artifact_id: &str) -> Self {
        Self {
            group_id: group_id.to_owned(),
            artifact_id: artifact_id.to_owned(),
            ..Self::default()
        }
    }

    pub fn parse(xml: &str) -> Result<Self, ResolveError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut path: Vec<String> = Vec::new();
        let mut meta = Self::default();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Ok(Event::End(_)) => {
                    path.pop();
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ResolveError::Metadata(e.to_string()))?
                        .trim()
                        .to_owned();
                    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
                    match segments.as_slice() {
                        ["metadata", "groupId"] => meta.group_id = text,
                        ["metadata", "artifactId"] => meta.artifact_id = text,
                        ["metadata", "versioning", "latest"] => meta.latest = Some(text),
                        ["metadata", "versioning", "release"] => meta.release = Some(text),
                        ["metadata", "versioning", "versions", "version"] if !text.is_empty() => {
                            meta.versions.push(text);
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ResolveError::Metadata(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )))
                }
                Ok(_) => {}
            }
        }
        if !path.is_empty() {
            return Err(ResolveError::Metadata(format!(
                "unclosed element <{}>",
                path.join("/")
            )));
        }
        Ok(meta)
    }

    /// Add a version if absent and refresh `latest`/`release`.
    pub fn add_version(&mut self, version: &str) {
        if !self.versions.iter().any(|v| v == version) {
            self.versions.push(version.to_owned());
        }
        let highest = self
            .versions
            .iter()
            .map(|v| MavenVersion::new(v.as_str()))
            .max();
        if let Some(highest) = highest {
            self.latest = Some(highest.as_str().to_owned());
            self.release = Some(highest.as_str().to_owned());
        }
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<metadata>\n");
        let _ = writeln!(out, "  <groupId>{}</groupId>", escape(&self.group_id));
        let _ = writeln!(out, "  <artifactId>{}</artifactId>", escape(&self.artifact_id));
        out.push_str("  <versioning>\n");
        if let Some(ref latest) = self.latest {
            let _ = writeln!(out, "    <latest>{}</latest>", escape(latest));
        }
        if let Some(ref release) = self.release {
            let _ = writeln!(out, "    <release>{}</release>", escape(release));
        }
        out.push_str("    <versions>\n");
        for v in &self.versions {
            let _ = writeln!(out, "      <version>{}</version>", escape(v));
        }
        out.push_str("    </versions>\n  </versioning>\n</metadata>\n");
        out
    }
}
