// src/package/codec.rs

//! Manifest text codec
//!
//! Hand-written encoder and decoder for the manifest document:
//!
//! ```xml
//! <MissionPackageManifest version="2">
//!    <Configuration>
//!       <Parameter name="uid" value="…"/>
//!       <Parameter name="name" value="…"/>
//!    </Configuration>
//!    <Contents>
//!       <Content ignore="false" zipEntry="…">
//!          <Parameter name="uid" value="…"/>
//!       </Content>
//!    </Contents>
//! </MissionPackageManifest>
//! ```

use std::collections::HashMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::ManifestError;
use super::content::{ContentEntry, ContentList};
use super::manifest::Manifest;
use super::parameters::{Parameter, ParameterSet};

pub const ROOT_ELEMENT: &str = "MissionPackageManifest";
const CONFIGURATION: &str = "Configuration";
const CONTENTS: &str = "Contents";
const CONTENT: &str = "Content";
const PARAMETER: &str = "Parameter";

const ATTR_VERSION: &str = "version";
const ATTR_NAME: &str = "name";
const ATTR_VALUE: &str = "value";
const ATTR_IGNORE: &str = "ignore";
const ATTR_ENTRY: &str = "zipEntry";

/// Serialize a manifest exactly as given (no view projection)
pub fn encode(manifest: &Manifest) -> Result<String, ManifestError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 3);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let version = manifest.version.to_string();
    let mut root = BytesStart::new(ROOT_ELEMENT);
    root.push_attribute((ATTR_VERSION, version.as_str()));
    writer.write_event(Event::Start(root))?;

    writer.write_event(Event::Start(BytesStart::new(CONFIGURATION)))?;
    write_parameters(&mut writer, &manifest.configuration)?;
    writer.write_event(Event::End(BytesEnd::new(CONFIGURATION)))?;

    writer.write_event(Event::Start(BytesStart::new(CONTENTS)))?;
    for entry in manifest.contents.iter() {
        let mut content = BytesStart::new(CONTENT);
        content.push_attribute((ATTR_IGNORE, if entry.ignore { "true" } else { "false" }));
        content.push_attribute((ATTR_ENTRY, entry.entry_key.as_str()));

        if entry.parameters.is_empty() {
            writer.write_event(Event::Empty(content))?;
        } else {
            writer.write_event(Event::Start(content))?;
            write_parameters(&mut writer, &entry.parameters)?;
            writer.write_event(Event::End(BytesEnd::new(CONTENT)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(CONTENTS)))?;

    writer.write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;

    String::from_utf8(writer.into_inner()).map_err(|e| ManifestError::Encoding(e.to_string()))
}

fn write_parameters(
    writer: &mut Writer<Vec<u8>>,
    params: &ParameterSet,
) -> Result<(), ManifestError> {
    for param in params {
        let mut element = BytesStart::new(PARAMETER);
        element.push_attribute((ATTR_NAME, param.name.as_str()));
        element.push_attribute((ATTR_VALUE, param.value.as_str()));
        writer.write_event(Event::Empty(element))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Configuration,
    Contents,
}

/// Parse a manifest document.
///
/// The version attribute is recorded as found (0 when absent); deciding
/// whether the version is supported is left to the caller.
pub fn decode(text: &str) -> Result<Manifest, ManifestError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut version: Option<u32> = None;
    let mut configuration = ParameterSet::new();
    let mut contents = ContentList::new();
    let mut section: Option<Section> = None;
    let mut current: Option<ContentEntry> = None;

    loop {
        let event = reader.read_event()?;
        let (element, is_empty) = match &event {
            Event::Start(e) => (Some(e), false),
            Event::Empty(e) => (Some(e), true),
            Event::End(e) => {
                match e.name().as_ref() {
                    n if n == CONTENT.as_bytes() => {
                        if let Some(entry) = current.take() {
                            contents.add(entry);
                        }
                    }
                    n if n == CONFIGURATION.as_bytes() || n == CONTENTS.as_bytes() => {
                        section = Some(Section::Root);
                    }
                    _ => {}
                }
                (None, false)
            }
            Event::Eof => break,
            _ => (None, false),
        };

        let Some(element) = element else {
            continue;
        };

        match element.name().as_ref() {
            n if n == ROOT_ELEMENT.as_bytes() => {
                let attrs = attributes(element)?;
                version = Some(
                    attrs
                        .get(ATTR_VERSION)
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(0),
                );
                section = Some(Section::Root);
            }
            n if n == CONFIGURATION.as_bytes() => {
                if !is_empty {
                    section = Some(Section::Configuration);
                }
            }
            n if n == CONTENTS.as_bytes() => {
                if !is_empty {
                    section = Some(Section::Contents);
                }
            }
            n if n == CONTENT.as_bytes() && section == Some(Section::Contents) => {
                let attrs = attributes(element)?;
                let key = attrs.get(ATTR_ENTRY).cloned().unwrap_or_default();
                let mut entry = ContentEntry::new(key);
                entry.ignore = attrs
                    .get(ATTR_IGNORE)
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

                if is_empty {
                    contents.add(entry);
                } else {
                    current = Some(entry);
                }
            }
            n if n == PARAMETER.as_bytes() => {
                let attrs = attributes(element)?;
                let param = Parameter::new(
                    attrs.get(ATTR_NAME).cloned().unwrap_or_default(),
                    attrs.get(ATTR_VALUE).cloned().unwrap_or_default(),
                );
                if let Some(entry) = current.as_mut() {
                    entry.add_parameter(param);
                } else if section == Some(Section::Configuration) {
                    configuration.insert(param);
                }
            }
            _ => {}
        }
    }

    let version = version.ok_or_else(|| ManifestError::MissingElement(ROOT_ELEMENT.to_string()))?;

    Ok(Manifest {
        version,
        configuration,
        contents,
        path: Default::default(),
    })
}

fn attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>, ManifestError> {
    let mut attrs = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::content::PARAM_NAME;

    fn sample() -> Manifest {
        let mut manifest = Manifest::new("Route & Overlays", "pkg-1");
        manifest.set_parameter("remarks", "quoted \"value\" <here>");
        let mut entry = ContentEntry::new("abc/map.kml");
        entry.set_parameter(PARAM_NAME, "map.kml");
        entry.ignore = true;
        manifest.add_content(entry);
        manifest.add_content(ContentEntry::new("bare/file.bin"));
        manifest
    }

    #[test]
    fn test_encode_layout() {
        let text = encode(&sample()).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains("<MissionPackageManifest version=\"2\">"));
        assert!(text.contains("zipEntry=\"abc/map.kml\""));
        assert!(text.contains("ignore=\"true\""));
        assert!(text.contains("Route &amp; Overlays"));
    }

    #[test]
    fn test_decode_encoded() {
        let original = sample();
        let decoded = decode(&encode(&original).unwrap()).unwrap();

        assert_eq!(decoded.version, 2);
        assert_eq!(decoded.configuration, original.configuration);
        assert_eq!(decoded.contents, original.contents);
    }

    #[test]
    fn test_decode_single_quotes_and_empty_contents() {
        let text = "<MissionPackageManifest version='2'>\
            <Configuration><Parameter name='uid' value='u'/><Parameter name='name' value='n'/></Configuration>\
            <Contents/></MissionPackageManifest>";
        let manifest = decode(text).unwrap();
        assert!(manifest.is_valid());
        assert!(manifest.contents.is_empty());
    }

    #[test]
    fn test_decode_missing_version() {
        let manifest = decode("<MissionPackageManifest><Configuration/></MissionPackageManifest>").unwrap();
        assert_eq!(manifest.version, 0);
        assert!(!manifest.is_valid());
    }

    #[test]
    fn test_decode_rejects_other_documents() {
        assert!(matches!(
            decode("<somethingElse/>"),
            Err(ManifestError::MissingElement(_))
        ));
        assert!(decode("<MissionPackageManifest version='2'><Contents></Configuration>").is_err());
    }

    #[test]
    fn test_decode_drops_invalid_parameters() {
        let text = "<MissionPackageManifest version='2'><Configuration>\
            <Parameter name='uid' value='u'/><Parameter name='' value='x'/><Parameter name='name' value=''/>\
            </Configuration></MissionPackageManifest>";
        let manifest = decode(text).unwrap();
        assert_eq!(manifest.configuration.len(), 1);
    }
}
