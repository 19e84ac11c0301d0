// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! AppStream metadata extraction.
//!
//! Installed Flatpak apps ship their metadata as AppStream XML, either plain
//! or gzip compressed. The document is either a `<components>` collection, of
//! which the first `<component>` is used, or a single `<component>`.
//!
//! # Localization
//!
//! Elements may carry an `xml:lang` attribute. Elements localized into any
//! language other than the requested one are dropped. When both a localized
//! and an unlocalized variant of the same element remain, the localized one
//! wins.

use flate2::read::GzDecoder;
use quick_xml::{events::Event, Reader};
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ICON_SIZE: &str = "64";

/// Metadata of one AppStream component.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub developer: String,
    pub project_license: String,
    pub icon: String,
    pub homepage: String,
    pub donate_url: String,
    pub categories: Vec<String>,
    pub keywords: Vec<String>,
    pub mediatypes: Vec<String>,
    pub screenshot_urls: Vec<String>,
}

/// Parse AppStream data into component metadata.
///
/// # Errors
///
/// - Return [`AppStreamError::Decompress`] if gzip data is corrupt.
/// - Return [`AppStreamError::Xml`] if data is not well-formed XML.
/// - Return [`AppStreamError::NoComponent`] if data holds no component.
pub fn parse_component(data: &[u8], language: &str) -> Result<Component> {
    let xml = if data.starts_with(&GZIP_MAGIC) {
        let mut xml = Vec::new();
        GzDecoder::new(data).read_to_end(&mut xml).map_err(AppStreamError::Decompress)?;
        xml
    } else {
        data.to_vec()
    };

    let root = Element::parse(&xml)?;
    let component = match root.name.as_str() {
        "component" => root,
        "components" => root
            .children
            .into_iter()
            .find(|child| child.name == "component")
            .ok_or(AppStreamError::NoComponent)?,
        _ => return Err(AppStreamError::NoComponent),
    };

    Ok(Component::from_element(&component.localized(language), language))
}

impl Component {
    fn from_element(component: &Element, language: &str) -> Self {
        let text_of = |name: &str| {
            component
                .child(name)
                .map(|child| child.text.clone())
                .unwrap_or_default()
        };

        let developer = component
            .child("developer")
            .and_then(|developer| developer.localized(language).child("name").map(|name| name.text.clone()))
            .unwrap_or_else(|| text_of("developer_name"));

        let description = component
            .child("description")
            .map(|description| render_description(&description.localized(language)))
            .unwrap_or_default();

        let icon = component
            .children_named("icon")
            .find(|icon| icon.attribute("width") == Some(ICON_SIZE) && icon.attribute("height") == Some(ICON_SIZE))
            .map(|icon| icon.text.clone())
            .unwrap_or_default();

        let url_of = |kind: &str| {
            component
                .children_named("url")
                .find(|url| url.attribute("type") == Some(kind))
                .map(|url| url.text.clone())
                .unwrap_or_default()
        };

        let mut mediatypes = texts_below(component, "provides", "mediatype");
        mediatypes.extend(texts_below(component, "mimetypes", "mimetype"));

        let screenshot_urls = component
            .child("screenshots")
            .map(|screenshots| {
                screenshots
                    .children_named("screenshot")
                    .filter_map(|screenshot| {
                        screenshot
                            .children_named("image")
                            .find(|image| image.attribute("type") != Some("thumbnail"))
                            .map(|image| image.text.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: text_of("id"),
            name: text_of("name"),
            summary: text_of("summary"),
            description,
            developer,
            project_license: text_of("project_license"),
            icon,
            homepage: url_of("homepage"),
            donate_url: url_of("donation"),
            categories: texts_below(component, "categories", "category"),
            keywords: component
                .child("keywords")
                .map(|keywords| {
                    keywords
                        .localized(language)
                        .children_named("keyword")
                        .map(|keyword| keyword.text.clone())
                        .collect()
                })
                .unwrap_or_default(),
            mediatypes,
            screenshot_urls,
        }
    }
}

fn texts_below(component: &Element, parent: &str, child: &str) -> Vec<String> {
    component
        .child(parent)
        .map(|parent| {
            parent
                .children_named(child)
                .map(|child| child.text.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Render description markup as plain text.
///
/// Paragraphs become blank-line separated blocks, list items become dashed
/// lines.
fn render_description(description: &Element) -> String {
    let mut blocks = Vec::new();
    for child in &description.children {
        match child.name.as_str() {
            "p" => blocks.push(child.text.clone()),
            "ul" | "ol" => blocks.push(
                child
                    .children_named("li")
                    .map(|item| format!("- {}", item.text))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => {}
        }
    }

    if blocks.is_empty() {
        description.text.clone()
    } else {
        blocks.join("\n\n")
    }
}

/// Minimal element tree.
#[derive(Debug, Default, Clone)]
struct Element {
    name: String,
    lang: Option<String>,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(start) => stack.push(Self::open(&start)?),
                Event::Empty(empty) => {
                    let element = Self::open(&empty)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        push_text(&mut current.text, &text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        push_text(&mut current.text, &String::from_utf8_lossy(&data));
                    }
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or(AppStreamError::Unbalanced)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => return Ok(element),
                    }
                }
                Event::Eof => return Err(AppStreamError::Unbalanced),
                _ => {}
            }
            buf.clear();
        }
    }

    fn open(start: &quick_xml::events::BytesStart<'_>) -> Result<Self> {
        let mut element = Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };

        for attribute in start.attributes() {
            let attribute = attribute?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            if key == "xml:lang" {
                element.lang = Some(value);
            } else {
                element.attributes.push((key, value));
            }
        }

        Ok(element)
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Copy of element with children in other languages dropped.
    fn localized(&self, language: &str) -> Self {
        let mut localized = Self {
            children: Vec::with_capacity(self.children.len()),
            ..self.clone()
        };

        for child in &self.children {
            match child.lang.as_deref() {
                Some(lang) if lang != language => continue,
                Some(_) => {
                    // INVARIANT: Localized variant replaces unlocalized one.
                    localized
                        .children
                        .retain(|kept| !(kept.name == child.name && kept.lang.is_none() && !is_repeated(&child.name)));
                    localized.children.push(child.clone());
                }
                None => {
                    let shadowed = !is_repeated(&child.name)
                        && localized
                            .children
                            .iter()
                            .any(|kept| kept.name == child.name && kept.lang.is_some());
                    if !shadowed {
                        localized.children.push(child.clone());
                    }
                }
            }
        }

        localized
    }
}

/// Elements that legitimately appear many times side by side.
fn is_repeated(name: &str) -> bool {
    matches!(
        name,
        "p" | "ul" | "ol" | "li" | "keyword" | "category" | "url" | "icon" | "screenshot" | "image"
    )
}

fn push_text(text: &mut String, chunk: &str) {
    let chunk = chunk.split_whitespace().collect::<Vec<_>>().join(" ");
    if chunk.is_empty() {
        return;
    }

    if !text.is_empty() {
        text.push(' ');
    }
    text.push_str(&chunk);
}

/// AppStream error types.
#[derive(Debug, thiserror::Error)]
pub enum AppStreamError {
    /// Compressed data cannot be inflated.
    #[error("failed to decompress appstream data")]
    Decompress(#[source] std::io::Error),

    /// Data is not well-formed XML.
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),

    /// Element attribute is malformed.
    #[error(transparent)]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// Document ends before all elements are closed.
    #[error("unbalanced appstream document")]
    Unbalanced,

    /// Document holds no component.
    #[error("no component in appstream data")]
    NoComponent,
}

/// Friendly result alias :3
pub type Result<T, E = AppStreamError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const COMPONENTS: &str = indoc! {r#"
        <?xml version="1.0" encoding="UTF-8"?>
        <components version="0.14" origin="flatpak">
          <component type="desktop-application">
            <id>org.gnome.Maps</id>
            <name>Maps</name>
            <name xml:lang="de">Karten</name>
            <summary>Find places around the world</summary>
            <summary xml:lang="de">Finden Sie Orte auf der ganzen Welt</summary>
            <description>
              <p>Maps gives you quick access to maps all across the world.</p>
              <p xml:lang="de">Karten bietet schnellen Zugriff.</p>
              <ul>
                <li>Search for places</li>
                <li>Get directions</li>
              </ul>
            </description>
            <developer id="org.gnome">
              <name>The GNOME Project</name>
            </developer>
            <project_license>GPL-2.0+</project_license>
            <url type="homepage">https://apps.gnome.org/Maps/</url>
            <url type="donation">https://www.gnome.org/donate/</url>
            <icon type="cached" width="64" height="64">org.gnome.Maps.png</icon>
            <icon type="cached" width="128" height="128">org.gnome.Maps.png</icon>
            <categories>
              <category>GNOME</category>
              <category>Utility</category>
            </categories>
            <keywords>
              <keyword>Maps</keyword>
              <keyword xml:lang="de">Karten</keyword>
            </keywords>
            <provides>
              <mediatype>x-scheme-handler/maps</mediatype>
              <mediatype>application/vnd.geo+json</mediatype>
            </provides>
            <screenshots>
              <screenshot type="default">
                <image type="source">https://example.org/maps.png</image>
                <image type="thumbnail" width="224" height="126">https://example.org/maps-small.png</image>
              </screenshot>
            </screenshots>
          </component>
          <component type="desktop-application">
            <id>org.gnome.Weather</id>
            <name>Weather</name>
          </component>
        </components>
    "#};

    #[test]
    fn parse_component_extracts_first_component() -> anyhow::Result<()> {
        let result = parse_component(COMPONENTS.as_bytes(), "en")?;
        let expect = Component {
            id: "org.gnome.Maps".into(),
            name: "Maps".into(),
            summary: "Find places around the world".into(),
            description: "Maps gives you quick access to maps all across the world.\n\n\
                          - Search for places\n- Get directions"
                .into(),
            developer: "The GNOME Project".into(),
            project_license: "GPL-2.0+".into(),
            icon: "org.gnome.Maps.png".into(),
            homepage: "https://apps.gnome.org/Maps/".into(),
            donate_url: "https://www.gnome.org/donate/".into(),
            categories: vec!["GNOME".into(), "Utility".into()],
            keywords: vec!["Maps".into()],
            mediatypes: vec![
                "x-scheme-handler/maps".into(),
                "application/vnd.geo+json".into(),
            ],
            screenshot_urls: vec!["https://example.org/maps.png".into()],
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn child_outlives_looked_up_name() -> anyhow::Result<()> {
        let root = Element::parse(COMPONENTS.as_bytes())?;
        let component = {
            let name = String::from("component");
            root.child(&name)
        };

        let id = component.and_then(|component| component.child("id"));
        assert_eq!(id.map(|id| id.text.as_str()), Some("org.gnome.Maps"));

        Ok(())
    }

    #[test]
    fn parse_component_prefers_requested_language() -> anyhow::Result<()> {
        let result = parse_component(COMPONENTS.as_bytes(), "de")?;

        assert_eq!(result.name, "Karten");
        assert_eq!(result.summary, "Finden Sie Orte auf der ganzen Welt");
        assert_eq!(result.keywords, vec!["Maps", "Karten"]);

        Ok(())
    }

    #[test]
    fn parse_component_accepts_gzip_and_single_component() -> anyhow::Result<()> {
        let xml = indoc! {r#"
            <component type="desktop-application">
              <id>org.example.App</id>
              <name>Example</name>
              <developer_name>Example Devs</developer_name>
              <description>Just text.</description>
            </component>
        "#};
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes())?;
        let data = encoder.finish()?;

        let result = parse_component(&data, "en")?;
        assert_eq!(result.name, "Example");
        assert_eq!(result.developer, "Example Devs");
        assert_eq!(result.description, "Just text.");

        Ok(())
    }

    #[test]
    fn parse_component_rejects_garbage() {
        assert!(parse_component(b"\x1f\x8bnot really gzip", "en").is_err());
        assert!(parse_component(b"<components><component>", "en").is_err());
        assert!(matches!(
            parse_component(b"<metadata/>", "en"),
            Err(AppStreamError::NoComponent)
        ));
        assert!(matches!(
            parse_component(b"<components></components>", "en"),
            Err(AppStreamError::NoComponent)
        ));
    }
}
