//! Builders for DOCX containers and partitioner output used across tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use docingest::partition::Element;
use zip::write::SimpleFileOptions;

const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

struct EmbeddedPart {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

/// Builds a minimal but well-formed DOCX.
pub struct DocxBuilder {
    paragraphs: Vec<String>,
    images: Vec<EmbeddedPart>,
    external_images: Vec<String>,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self {
            paragraphs: Vec::new(),
            images: Vec::new(),
            external_images: Vec::new(),
        }
    }

    pub fn paragraph(mut self, text: &str) -> Self {
        self.paragraphs.push(text.to_string());
        self
    }

    /// Adds `word/media/<file_name>` declared with `content_type`.
    pub fn image(mut self, file_name: &str, content_type: &str, data: Vec<u8>) -> Self {
        self.images.push(EmbeddedPart {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            data,
        });
        self
    }

    /// Adds an image relationship pointing outside the container.
    pub fn external_image(mut self, url: &str) -> Self {
        self.external_images.push(url.to_string());
        self
    }

    fn document_xml(&self) -> String {
        let body: String = self
            .paragraphs
            .iter()
            .map(|p| {
                format!(
                    r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
                    escape(p)
                )
            })
            .collect();
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
                "<w:body>{}</w:body></w:document>"
            ),
            body
        )
    }

    fn rels_xml(&self) -> String {
        let mut rels = String::new();
        for (i, image) in self.images.iter().enumerate() {
            rels.push_str(&format!(
                r#"<Relationship Id="rIdImg{}" Type="{}" Target="media/{}"/>"#,
                i + 1,
                IMAGE_REL_TYPE,
                image.file_name
            ));
        }
        for (i, url) in self.external_images.iter().enumerate() {
            rels.push_str(&format!(
                r#"<Relationship Id="rIdExt{}" Type="{}" Target="{}" TargetMode="External"/>"#,
                i + 1,
                IMAGE_REL_TYPE,
                escape(url)
            ));
        }
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                "{}</Relationships>"
            ),
            rels
        )
    }

    fn content_types_xml(&self) -> String {
        let overrides: String = self
            .images
            .iter()
            .map(|image| {
                format!(
                    r#"<Override PartName="/word/media/{}" ContentType="{}"/>"#,
                    image.file_name, image.content_type
                )
            })
            .collect();
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="xml" ContentType="application/xml"/>"#,
                r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
                "{}</Types>"
            ),
            overrides
        )
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        writer.start_file("[Content_Types].xml", options).unwrap();
        writer.write_all(self.content_types_xml().as_bytes()).unwrap();

        writer.start_file("word/document.xml", options).unwrap();
        writer.write_all(self.document_xml().as_bytes()).unwrap();

        writer.start_file("word/_rels/document.xml.rels", options).unwrap();
        writer.write_all(self.rels_xml().as_bytes()).unwrap();

        for image in &self.images {
            writer
                .start_file(format!("word/media/{}", image.file_name), options)
                .unwrap();
            writer.write_all(&image.data).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("Failed to write DOCX");
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A small white PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
    let mut data = Vec::new();
    img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap();
    data
}

/// Bytes with a WMF placeable header that no converter here can rasterize.
pub fn broken_wmf_bytes() -> Vec<u8> {
    let mut data = vec![0xD7, 0xCD, 0xC6, 0x9A];
    data.extend_from_slice(&[0u8; 60]);
    data
}

pub fn paged(text: &str, page: u32) -> Element {
    Element::new("NarrativeText", text).on_page(page)
}

pub fn unpaged(text: &str) -> Element {
    Element::new("NarrativeText", text)
}
