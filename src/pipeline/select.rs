//! Loader selection: decide how pages are acquired from a file.
//!
//! Decision order:
//! 1. image extension → vision loader
//! 2. spreadsheet extension → tabular loader
//! 3. PDF → native-text loader when the first pages carry enough text,
//!    vision loader otherwise
//! 4. anything else → native-text loader

use crate::document::Modality;
use crate::pipeline::input::{file_kind, FileKind};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Page-acquisition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    /// Native text layer (PDF text, plain-text files).
    NativeText,
    /// Page images for a vision model (rendered PDF pages, image files).
    Vision,
    /// Worksheets rendered as Markdown tables.
    Tabular,
}

impl LoaderKind {
    pub fn name(self) -> &'static str {
        match self {
            LoaderKind::NativeText => "native-text",
            LoaderKind::Vision => "vision",
            LoaderKind::Tabular => "tabular",
        }
    }

    pub fn modality(self) -> Modality {
        match self {
            LoaderKind::Vision => Modality::Vision,
            LoaderKind::NativeText | LoaderKind::Tabular => Modality::Text,
        }
    }

    /// Loader that produces `modality` content for the segmentation fallback.
    pub fn for_modality(modality: Modality) -> Self {
        match modality {
            Modality::Vision => LoaderKind::Vision,
            Modality::Text => LoaderKind::NativeText,
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of loader selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderSelection {
    pub kind: LoaderKind,
    pub vision: bool,
}

impl LoaderSelection {
    pub fn new(kind: LoaderKind) -> Self {
        Self {
            kind,
            vision: kind.modality().is_vision(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn modality(&self) -> Modality {
        Modality::from_vision_flag(self.vision)
    }
}

/// Thresholds for the native-text probe.
#[derive(Debug, Clone, Copy)]
pub struct TextProbe {
    pub pages: usize,
    pub min_chars: usize,
}

impl Default for TextProbe {
    fn default() -> Self {
        Self {
            pages: 3,
            min_chars: 50,
        }
    }
}

/// Choose a loader for `path`.
///
/// `count_text` returns the non-whitespace character count over the first
/// `probe.pages` PDF pages. It is only called for PDFs and must swallow its
/// own failures (returning 0).
pub fn select_loader(
    path: &Path,
    probe: TextProbe,
    count_text: impl FnOnce(&Path, usize) -> usize,
) -> LoaderSelection {
    let kind = match file_kind(path) {
        FileKind::Image => LoaderKind::Vision,
        FileKind::Spreadsheet => LoaderKind::Tabular,
        FileKind::Pdf => {
            let chars = count_text(path, probe.pages);
            debug!(
                "Probe found {} text chars in first {} pages of {}",
                chars,
                probe.pages,
                path.display()
            );
            if chars >= probe.min_chars {
                LoaderKind::NativeText
            } else {
                LoaderKind::Vision
            }
        }
        FileKind::Other => LoaderKind::NativeText,
    };
    LoaderSelection::new(kind)
}
