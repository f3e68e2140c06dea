//! Output types and file naming.

use crate::pipeline::segment::Segment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;

static SLIDE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(pptx?|pdf)$").unwrap());

const DEFAULT_FILE_NAME: &str = "download.pdf";

/// One finished PDF, covering one segment of the slide set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfDocument {
    /// Serialized PDF.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Page range this document covers.
    pub segment: Segment,
    /// 1-indexed part number.
    pub part: usize,
    /// Number of parts in the run.
    pub parts: usize,
    /// Pages actually placed in the document.
    pub page_count: usize,
    /// Pages of the segment that failed and were left out, ascending.
    pub skipped_pages: Vec<usize>,
}

impl PdfDocument {
    /// File name for this document: `file_name` itself for a single-part
    /// run, `stem_Part{N}.ext` otherwise.
    pub fn suggested_name(&self, file_name: &str) -> String {
        if self.parts <= 1 {
            file_name.to_string()
        } else {
            part_file_name(file_name, self.part)
        }
    }
}

/// Result of a run: one document, or one per segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutput {
    Single(PdfDocument),
    Parts(Vec<PdfDocument>),
}

impl PdfOutput {
    pub(crate) fn from_documents(mut documents: Vec<PdfDocument>) -> Option<Self> {
        match documents.len() {
            0 => None,
            1 => documents.pop().map(PdfOutput::Single),
            _ => Some(PdfOutput::Parts(documents)),
        }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        match self {
            PdfOutput::Single(_) => 1,
            PdfOutput::Parts(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn documents(&self) -> &[PdfDocument] {
        match self {
            PdfOutput::Single(doc) => std::slice::from_ref(doc),
            PdfOutput::Parts(docs) => docs,
        }
    }

    pub fn into_documents(self) -> Vec<PdfDocument> {
        match self {
            PdfOutput::Single(doc) => vec![doc],
            PdfOutput::Parts(docs) => docs,
        }
    }

    /// Pair every document with the name it should be saved under.
    pub fn named<'a>(&'a self, file_name: &str) -> Vec<(String, &'a PdfDocument)> {
        self.documents()
            .iter()
            .map(|doc| (doc.suggested_name(file_name), doc))
            .collect()
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    /// Normalized base file name, e.g. `lecture.pdf`.
    pub file_name: String,
    pub output: PdfOutput,
    pub stats: DownloadStats,
}

/// What [`crate::convert::generate_to_dir`] wrote.
#[derive(Debug, Clone, Serialize)]
pub struct SavedOutput {
    /// Written files, in part order.
    pub paths: Vec<PathBuf>,
    pub stats: DownloadStats,
}

/// Statistics about a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    /// Pages in the slide set.
    pub total_pages: usize,
    /// Pages placed across all documents.
    pub added_pages: usize,
    /// Pages that failed and were left out.
    pub skipped_pages: Vec<usize>,
    /// Number of documents produced.
    pub segments: usize,
    /// Total wall-clock time.
    pub total_duration_ms: u64,
    /// Sum of all document sizes.
    pub output_bytes: usize,
}

impl DownloadStats {
    pub(crate) fn from_documents(total_pages: usize, documents: &[PdfDocument], elapsed_ms: u64) -> Self {
        Self {
            total_pages,
            added_pages: documents.iter().map(|d| d.page_count).sum(),
            skipped_pages: documents
                .iter()
                .flat_map(|d| d.skipped_pages.iter().copied())
                .collect(),
            segments: documents.len(),
            total_duration_ms: elapsed_ms,
            output_bytes: documents.iter().map(|d| d.bytes.len()).sum(),
        }
    }
}

/// Normalize a suggested document name to a `.pdf` file name.
///
/// Empty names become `download.pdf`; a `.ppt`, `.pptx` or `.pdf` extension
/// (any case) is replaced with `.pdf`; anything else gets `.pdf` appended.
pub fn normalize_file_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return DEFAULT_FILE_NAME.to_string();
    }
    if SLIDE_EXTENSION.is_match(name) {
        SLIDE_EXTENSION.replace(name, ".pdf").into_owned()
    } else {
        format!("{}.pdf", name)
    }
}

/// `lecture.pdf` → `lecture_Part2.pdf`.
pub fn part_file_name(file_name: &str, part: usize) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_Part{}{}", &file_name[..dot], part, &file_name[dot..]),
        _ => format!("{}_Part{}", file_name, part),
    }
}

/// Replace characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(part: usize, parts: usize, pages: usize) -> PdfDocument {
        PdfDocument {
            bytes: vec![0; 10],
            segment: Segment::new(1, pages),
            part,
            parts,
            page_count: pages,
            skipped_pages: vec![],
        }
    }

    #[test]
    fn file_names_are_normalized() {
        assert_eq!(normalize_file_name(""), "download.pdf");
        assert_eq!(normalize_file_name("   "), "download.pdf");
        assert_eq!(normalize_file_name("Week 3.pptx"), "Week 3.pdf");
        assert_eq!(normalize_file_name("intro.PPT"), "intro.pdf");
        assert_eq!(normalize_file_name("notes.pdf"), "notes.pdf");
        assert_eq!(normalize_file_name("notes"), "notes.pdf");
        assert_eq!(normalize_file_name("v1.2 final"), "v1.2 final.pdf");
    }

    #[test]
    fn part_names_insert_suffix_before_extension() {
        assert_eq!(part_file_name("lecture.pdf", 1), "lecture_Part1.pdf");
        assert_eq!(part_file_name("a.b.pdf", 3), "a.b_Part3.pdf");
        assert_eq!(part_file_name("noext", 2), "noext_Part2");
    }

    #[test]
    fn single_document_keeps_the_plain_name() {
        let out = PdfOutput::from_documents(vec![doc(1, 1, 5)]).unwrap();
        assert!(matches!(out, PdfOutput::Single(_)));
        assert_eq!(out.named("deck.pdf")[0].0, "deck.pdf");
    }

    #[test]
    fn parts_are_numbered() {
        let out = PdfOutput::from_documents(vec![doc(1, 2, 150), doc(2, 2, 20)]).unwrap();
        let names: Vec<String> = out.named("deck.pdf").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["deck_Part1.pdf", "deck_Part2.pdf"]);
        assert_eq!(out.len(), 2);
        assert!(PdfOutput::from_documents(vec![]).is_none());
    }

    #[test]
    fn stats_sum_over_documents() {
        let mut second = doc(2, 2, 19);
        second.skipped_pages = vec![160];
        let stats = DownloadStats::from_documents(170, &[doc(1, 2, 150), second], 42);
        assert_eq!(stats.added_pages, 169);
        assert_eq!(stats.skipped_pages, vec![160]);
        assert_eq!(stats.segments, 2);
        assert_eq!(stats.output_bytes, 20);
    }

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize_file_name("a/b:c?.pdf"), "a_b_c_.pdf");
        assert_eq!(sanitize_file_name("Week 3.pdf"), "Week 3.pdf");
    }
}
