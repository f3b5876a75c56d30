//! pom.xml parser for Maven projects
//!
//! Handles:
//! - `<dependencies>` and `<dependencyManagement>`
//! - `${property}` substitution from `<properties>`, `project.version` and
//!   `project.parent.version`
//! - versions inherited from the file's own `<dependencyManagement>`
//! - `test`, `provided` and `optional` dependencies
//!
//! Plugin dependencies are not read.

use super::{GraphFragment, ManifestAdapter};
use crate::domain::{Constraint, Dependency, Ecosystem, Scope, SourceLocation};
use crate::error::ManifestError;
use crate::parser::parse_constraint;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Parser for pom.xml files
pub struct PomXmlParser;

/// A `<dependency>` element being read
#[derive(Default)]
struct DepAccum {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    optional: bool,
    line: Option<usize>,
    managed: bool,
}

fn line_at(content: &str, offset: u64) -> usize {
    let offset = (offset as usize).min(content.len());
    content.get(..offset).unwrap_or(content).matches('\n').count() + 1
}

/// Replaces `${name}` references, leaving unknown ones in place
fn substitute(value: &str, properties: &HashMap<String, String>) -> String {
    let mut output = value.to_string();
    // Properties may refer to other properties
    for _ in 0..4 {
        let Some(start) = output.find("${") else {
            break;
        };
        let Some(len) = output[start..].find('}') else {
            break;
        };
        let key = &output[start + 2..start + len];
        let Some(replacement) = properties.get(key) else {
            break;
        };
        output = format!("{}{}{}", &output[..start], replacement, &output[start + len + 1..]);
    }
    output
}

fn maven_scope(dep: &DepAccum) -> Scope {
    if dep.optional {
        return Scope::Optional;
    }
    match dep.scope.as_deref() {
        Some("test") => Scope::Dev,
        Some("provided") => Scope::Peer,
        _ => Scope::Runtime,
    }
}

impl ManifestAdapter for PomXmlParser {
    fn parse(&self, content: &str, path: &Path) -> Result<GraphFragment, ManifestError> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<String> = Vec::new();
        let mut properties: HashMap<String, String> = HashMap::new();
        let mut accumulated: Vec<DepAccum> = Vec::new();
        let mut current: Option<DepAccum> = None;

        loop {
            let pos = reader.buffer_position();
            let event = reader.read_event().map_err(|e| {
                ManifestError::parse_error(path, Some(line_at(content, pos)), e.to_string())
            })?;

            match event {
                Event::Start(ref e) => {
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    let in_plugin = stack.iter().any(|t| t == "plugin");
                    if tag == "dependency"
                        && !in_plugin
                        && stack.last().is_some_and(|t| t == "dependencies")
                    {
                        current = Some(DepAccum {
                            managed: stack.iter().any(|t| t == "dependencyManagement"),
                            ..DepAccum::default()
                        });
                    }
                    stack.push(tag);
                }
                Event::Text(ref e) => {
                    let text = match e.decode() {
                        Ok(cow) => {
                            let s = cow.trim().to_string();
                            quick_xml::escape::unescape(&s)
                                .map(|c| c.into_owned())
                                .unwrap_or(s)
                        }
                        Err(_) => String::from_utf8_lossy(e.as_ref()).trim().to_string(),
                    };
                    let depth = stack.len();
                    let tag = stack.last().map(String::as_str).unwrap_or_default();
                    let parent = depth
                        .checked_sub(2)
                        .and_then(|i| stack.get(i))
                        .map(String::as_str)
                        .unwrap_or_default();

                    if let (Some(dep), "dependency") = (current.as_mut(), parent) {
                        match tag {
                            "groupId" => dep.group_id = Some(text),
                            "artifactId" => {
                                dep.artifact_id = Some(text);
                                dep.line = Some(line_at(content, pos));
                            }
                            "version" => dep.version = Some(text),
                            "scope" => dep.scope = Some(text),
                            "optional" => dep.optional = text == "true",
                            _ => {}
                        }
                    } else if depth == 3 && parent == "properties" {
                        properties.insert(tag.to_string(), text);
                    } else if depth == 2 && tag == "version" {
                        properties.insert("project.version".to_string(), text);
                    } else if depth == 3 && parent == "parent" && tag == "version" {
                        properties.insert("project.parent.version".to_string(), text);
                    }
                }
                Event::End(ref e) => {
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    stack.pop();
                    if tag == "dependency" {
                        if let Some(dep) = current.take() {
                            accumulated.push(dep);
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // Versions declared in dependencyManagement fill in plain declarations
        let managed: HashMap<(String, String), String> = accumulated
            .iter()
            .filter(|d| d.managed)
            .filter_map(|d| {
                Some((
                    (d.group_id.clone()?, d.artifact_id.clone()?),
                    d.version.clone()?,
                ))
            })
            .collect();

        let mut dependencies = Vec::new();
        for (index, dep) in accumulated.iter().enumerate() {
            let (Some(group), Some(artifact)) = (&dep.group_id, &dep.artifact_id) else {
                continue;
            };
            let group = substitute(group, &properties);
            let name = format!("{}:{}", group, artifact);
            let version = dep
                .version
                .clone()
                .or_else(|| managed.get(&(group.clone(), artifact.clone())).cloned());

            let constraint = match version {
                Some(version) => parse_constraint(Ecosystem::Maven, &substitute(&version, &properties)),
                None => Constraint::unparsed("managed"),
            };

            let section = if dep.managed {
                "dependencyManagement"
            } else {
                "dependencies"
            };
            let source = SourceLocation::new(path, section).with_line(dep.line, content);
            dependencies.push(
                Dependency::new(Ecosystem::Maven, name, constraint, maven_scope(dep), source)
                    .with_position(dep.line.unwrap_or(index)),
            );
        }

        Ok(GraphFragment::manifest(path, Ecosystem::Maven, dependencies))
    }

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintKind;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.example</groupId>
  <artifactId>app</artifactId>
  <version>2.1.0</version>

  <properties>
    <jackson.version>2.15.2</jackson.version>
  </properties>

  <dependencyManagement>
    <dependencies>
      <dependency>
        <groupId>org.slf4j</groupId>
        <artifactId>slf4j-api</artifactId>
        <version>2.0.9</version>
      </dependency>
    </dependencies>
  </dependencyManagement>

  <dependencies>
    <dependency>
      <groupId>com.fasterxml.jackson.core</groupId>
      <artifactId>jackson-databind</artifactId>
      <version>${jackson.version}</version>
    </dependency>
    <dependency>
      <groupId>org.slf4j</groupId>
      <artifactId>slf4j-api</artifactId>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>[4.13,5.0)</version>
      <scope>test</scope>
    </dependency>
    <dependency>
      <groupId>com.example</groupId>
      <artifactId>core</artifactId>
      <version>${project.version}</version>
      <optional>true</optional>
    </dependency>
  </dependencies>

  <build>
    <plugins>
      <plugin>
        <artifactId>maven-compiler-plugin</artifactId>
        <dependencies>
          <dependency>
            <groupId>org.ow2.asm</groupId>
            <artifactId>asm</artifactId>
            <version>9.5</version>
          </dependency>
        </dependencies>
      </plugin>
    </plugins>
  </build>
</project>
"#;

    fn parse(content: &str) -> Result<Vec<Dependency>, ManifestError> {
        PomXmlParser
            .parse(content, Path::new("pom.xml"))
            .map(|f| f.dependencies)
    }

    #[test]
    fn test_parse_dependencies() {
        let deps = parse(POM).unwrap();
        assert_eq!(deps.len(), 5);
        assert!(deps.iter().all(|d| d.name != "org.ow2.asm:asm"));

        let managed = &deps[0];
        assert_eq!(managed.name, "org.slf4j:slf4j-api");
        assert_eq!(managed.source.section, "dependencyManagement");
        assert_eq!(managed.source.line, Some(16));
    }

    #[test]
    fn test_property_substitution() {
        let deps = parse(POM).unwrap();
        let jackson = deps
            .iter()
            .find(|d| d.name == "com.fasterxml.jackson.core:jackson-databind")
            .unwrap();
        assert_eq!(jackson.constraint.raw, "2.15.2");
        assert_eq!(jackson.constraint.kind, ConstraintKind::Exact);

        let core = deps.iter().find(|d| d.name == "com.example:core").unwrap();
        assert_eq!(core.constraint.raw, "2.1.0");
        assert_eq!(core.scope, Scope::Optional);
    }

    #[test]
    fn test_managed_version_inherited() {
        let deps = parse(POM).unwrap();
        let slf4j = deps
            .iter()
            .find(|d| d.name == "org.slf4j:slf4j-api" && d.source.section == "dependencies")
            .unwrap();
        assert_eq!(slf4j.constraint.raw, "2.0.9");
    }

    #[test]
    fn test_scopes_and_ranges() {
        let deps = parse(POM).unwrap();
        let junit = deps.iter().find(|d| d.name == "junit:junit").unwrap();
        assert_eq!(junit.scope, Scope::Dev);
        assert_eq!(junit.constraint.kind, ConstraintKind::Range);
    }

    #[test]
    fn test_unresolved_property_kept() {
        let content = r#"<project><dependencies><dependency>
<groupId>a</groupId><artifactId>b</artifactId><version>${missing}</version>
</dependency></dependencies></project>"#;
        let deps = parse(content).unwrap();
        assert_eq!(deps[0].constraint.kind, ConstraintKind::Unparsed);
    }

    #[test]
    fn test_parse_malformed() {
        let err = parse("<project><dependencies></project>").unwrap_err();
        assert!(matches!(err, ManifestError::ParseError { .. }));
    }
}
