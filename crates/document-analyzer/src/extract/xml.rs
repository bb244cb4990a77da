//! Well-formedness-checked XML events for OOXML parts
//!
//! Parts are read with `quick_xml` into a flat list of owned events. Empty
//! elements are reported as a start immediately followed by its end, and a
//! part that ends with open elements or closes the wrong one is an error.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
    },
    End {
        name: String,
    },
    Text(String),
}

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("malformed XML at byte {position}: {source}")]
    Malformed {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },

    #[error("expected </{expected}> but found </{found}>")]
    MismatchedEnd { expected: String, found: String },

    #[error("XML ends inside <{element}>")]
    Unclosed { element: String },
}

/// Parse `xml` into events in document order
pub fn events(xml: &str) -> Result<Vec<XmlEvent>, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.check_end_names(false);

    let mut out = Vec::new();
    let mut open: Vec<String> = Vec::new();

    loop {
        let malformed =
            |source: quick_xml::Error, position: usize| XmlError::Malformed { position, source };
        let event = reader
            .read_event()
            .map_err(|e| malformed(e, reader.buffer_position()))?;

        match event {
            Event::Start(start) => {
                let (name, attrs) =
                    element(&start).map_err(|e| malformed(e, reader.buffer_position()))?;
                open.push(name.clone());
                out.push(XmlEvent::Start { name, attrs });
            }
            Event::Empty(start) => {
                let (name, attrs) =
                    element(&start).map_err(|e| malformed(e, reader.buffer_position()))?;
                out.push(XmlEvent::Start {
                    name: name.clone(),
                    attrs,
                });
                out.push(XmlEvent::End { name });
            }
            Event::End(end) => {
                let found = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                match open.pop() {
                    Some(expected) if expected == found => {
                        out.push(XmlEvent::End { name: found })
                    }
                    Some(expected) => return Err(XmlError::MismatchedEnd { expected, found }),
                    None => {
                        return Err(XmlError::MismatchedEnd {
                            expected: String::new(),
                            found,
                        })
                    }
                }
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| malformed(e, reader.buffer_position()))?;
                out.push(XmlEvent::Text(text.into_owned()));
            }
            Event::CData(data) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                out.push(XmlEvent::Text(text));
            }
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::Comment(_) | Event::DocType(_) => {}
        }
    }

    match open.pop() {
        Some(element) => Err(XmlError::Unclosed { element }),
        None => Ok(out),
    }
}

fn element(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), quick_xml::Error> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok((name, attrs))
}

/// Value of attribute `key`
pub fn attribute<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Text of the first element named `name`; `None` if absent or the part is malformed
pub fn element_text(xml: &str, name: &str) -> Option<String> {
    let mut inside = false;
    let mut text = String::new();

    for event in events(xml).ok()? {
        match event {
            XmlEvent::Start { name: n, .. } if n == name => inside = true,
            XmlEvent::End { name: n } if n == name && inside => {
                let value = text.trim().to_string();
                return (!value.is_empty()).then_some(value);
            }
            XmlEvent::Text(t) if inside => text.push_str(&t),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn start(name: &str, attrs: &[(&str, &str)]) -> XmlEvent {
        XmlEvent::Start {
            name: name.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn end(name: &str) -> XmlEvent {
        XmlEvent::End {
            name: name.to_string(),
        }
    }

    #[test]
    fn test_events_basic() {
        let xml = r#"<?xml version="1.0"?><w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Hi</w:t></w:r></w:p>"#;
        assert_eq!(
            events(xml).unwrap(),
            vec![
                start("w:p", &[]),
                start("w:pPr", &[]),
                start("w:pStyle", &[("w:val", "Heading1")]),
                end("w:pStyle"),
                end("w:pPr"),
                start("w:r", &[]),
                start("w:t", &[]),
                XmlEvent::Text("Hi".into()),
                end("w:t"),
                end("w:r"),
                end("w:p"),
            ]
        );
    }

    #[test]
    fn test_attribute_lookup() {
        let events = events(r#"<w:x xw:val="no" w:val="Heading2" w:other='a &amp; b'/>"#).unwrap();
        let XmlEvent::Start { attrs, .. } = &events[0] else {
            panic!("unexpected event {:?}", events[0]);
        };
        assert_eq!(attribute(attrs, "w:val"), Some("Heading2"));
        assert_eq!(attribute(attrs, "w:other"), Some("a & b"));
        assert_eq!(attribute(attrs, "w:missing"), None);
    }

    #[test]
    fn test_entities_are_resolved() {
        let events = events("<w:t>A &amp; B &lt;C&gt; &#233;&#x20AC;</w:t>").unwrap();
        assert_eq!(events[1], XmlEvent::Text("A & B <C> é€".into()));
    }

    #[test]
    fn test_truncated_xml_is_rejected() {
        let err = events("<w:body><w:p><w:r><w:t>Notified Bo").unwrap_err();
        assert!(matches!(err, XmlError::Unclosed { ref element } if element == "w:t"), "{err}");

        assert!(events("<w:body><w:p><w:r><w:t").is_err());
    }

    #[test]
    fn test_mismatched_end_is_rejected() {
        let err = events("<w:p><w:r>text</w:p></w:r>").unwrap_err();
        assert!(matches!(err, XmlError::MismatchedEnd { .. }), "{err}");
        assert!(events("</w:p>").is_err());
    }

    #[test]
    fn test_element_text() {
        let xml = "<cp:coreProperties><dc:title>EU DoC</dc:title><dc:creator>Jane &amp; Co</dc:creator></cp:coreProperties>";
        assert_eq!(element_text(xml, "dc:title").as_deref(), Some("EU DoC"));
        assert_eq!(element_text(xml, "dc:creator").as_deref(), Some("Jane & Co"));
        assert_eq!(element_text(xml, "dc:subject"), None);
        assert_eq!(element_text("<dc:title>cut", "dc:title"), None);
    }
}
