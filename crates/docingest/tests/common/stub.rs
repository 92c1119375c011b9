//! A scripted partitioner that records every request it receives.

#![allow(dead_code)]

use std::sync::Mutex;

use docingest::error::PartitionError;
use docingest::partition::{DocumentKind, Element, PartitionRequest, Partitioner};

#[derive(Default)]
pub struct StubPartitioner {
    pdf: Vec<Element>,
    docx: Vec<Element>,
    image: Vec<Element>,
    fail_kind: Option<DocumentKind>,
    requests: Mutex<Vec<PartitionRequest>>,
}

impl StubPartitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pdf(mut self, elements: Vec<Element>) -> Self {
        self.pdf = elements;
        self
    }

    pub fn docx(mut self, elements: Vec<Element>) -> Self {
        self.docx = elements;
        self
    }

    pub fn image(mut self, elements: Vec<Element>) -> Self {
        self.image = elements;
        self
    }

    /// Every request of this kind fails with an API error.
    pub fn failing(mut self, kind: DocumentKind) -> Self {
        self.fail_kind = Some(kind);
        self
    }

    pub fn requests(&self) -> Vec<PartitionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_of(&self, kind: DocumentKind) -> Vec<PartitionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }
}

impl Partitioner for StubPartitioner {
    fn partition(&self, request: &PartitionRequest) -> Result<Vec<Element>, PartitionError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.fail_kind == Some(request.kind) {
            return Err(PartitionError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }

        let elements = match request.kind {
            DocumentKind::Pdf => &self.pdf,
            DocumentKind::Docx => &self.docx,
            DocumentKind::Image => &self.image,
        };
        Ok(elements.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
