use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PartitionError;
use crate::partition::Element;

pub(super) fn partition_docx(path: &Path) -> Result<Vec<Element>, PartitionError> {
    let _span = tracing::info_span!("partition.local.docx").entered();

    let file = std::fs::File::open(path).map_err(|e| PartitionError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| PartitionError::Docx(format!("Failed to open DOCX: {}", e)))?;

    let xml = read_document_xml(&mut archive)?;
    parse_document_xml(&xml)
}

fn read_document_xml<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<String, PartitionError> {
    let mut document_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| PartitionError::Docx(format!("Failed to find document.xml: {}", e)))?;

    let mut content = String::new();
    document_xml
        .read_to_string(&mut content)
        .map_err(|e| PartitionError::Docx(format!("Failed to read document.xml: {}", e)))?;
    Ok(content)
}

#[derive(Default)]
struct Paragraph {
    text: String,
    style: Option<String>,
    numbered: bool,
}

impl Paragraph {
    fn element_type(&self) -> &'static str {
        match self.style.as_deref() {
            Some(style) if style.starts_with("Heading") || style == "Title" => "Title",
            _ if self.numbered => "ListItem",
            Some(style) if style.starts_with("List") => "ListItem",
            _ => "NarrativeText",
        }
    }
}

/// Walks `word/document.xml` and returns one element per non-empty paragraph,
/// in document order.
fn parse_document_xml(xml: &str) -> Result<Vec<Element>, PartitionError> {
    let mut reader = Reader::from_str(xml);

    let mut elements = Vec::new();
    let mut paragraph: Option<Paragraph> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"p" => paragraph = Some(Paragraph::default()),
                b"t" => in_text = true,
                b"numPr" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.numbered = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if let Some(p) = paragraph.as_mut() {
                    match e.local_name().as_ref() {
                        b"pStyle" => p.style = attribute_value(e, b"val"),
                        b"numPr" => p.numbered = true,
                        b"tab" => p.text.push('\t'),
                        b"br" | b"cr" => p.text.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if let Some(p) = paragraph.take() {
                        let text = p.text.trim();
                        if !text.is_empty() {
                            elements.push(Element::new(p.element_type(), text));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    let decoded = e.decode().unwrap_or_default();
                    p.text.push_str(&decoded);
                }
            }
            Ok(Event::GeneralRef(e)) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    if let Ok(Some(ch)) = e.resolve_char_ref() {
                        p.text.push(ch);
                    } else if let Ok(name) = e.decode() {
                        if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(&name)
                        {
                            p.text.push_str(resolved);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PartitionError::Docx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    Ok(elements)
}

fn attribute_value(element: &BytesStart<'_>, local_name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local_name)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}
