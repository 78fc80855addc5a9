//! In-flight data: pages, their content, and candidate document groups.
//!
//! These types live only for the duration of one run. The orchestrator owns
//! the page list and the group list; downstream stages borrow them.

use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether content is read as text or looked at as images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Vision,
}

impl Modality {
    pub fn from_vision_flag(vision: bool) -> Self {
        if vision {
            Modality::Vision
        } else {
            Modality::Text
        }
    }

    pub fn is_vision(self) -> bool {
        self == Modality::Vision
    }

    /// The other modality, used by the segmentation fallback.
    pub fn alternate(self) -> Self {
        match self {
            Modality::Text => Modality::Vision,
            Modality::Vision => Modality::Text,
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => f.write_str("text"),
            Modality::Vision => f.write_str("vision"),
        }
    }
}

/// Raw content of one page.
#[derive(Clone)]
pub enum PageContent {
    Text(String),
    Image(ImageData),
}

impl PageContent {
    pub fn modality(&self) -> Modality {
        match self {
            PageContent::Text(_) => Modality::Text,
            PageContent::Image(_) => Modality::Vision,
        }
    }
}

impl fmt::Debug for PageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageContent::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            PageContent::Image(img) => f
                .debug_tuple("Image")
                .field(&img.mime_type)
                .field(&img.data.len())
                .finish(),
        }
    }
}

/// One unit of paginated input. `index` is 1-based.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub content: PageContent,
}

impl Page {
    pub fn text(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            content: PageContent::Text(text.into()),
        }
    }

    pub fn image(index: usize, image: ImageData) -> Self {
        Self {
            index,
            content: PageContent::Image(image),
        }
    }
}

/// Content of one or more pages, flattened into what a model request carries.
#[derive(Clone, Default)]
pub struct Content {
    pub text: String,
    pub images: Vec<ImageData>,
}

impl Content {
    /// Concatenate pages in the order given. Text pages are delimited by
    /// page markers so the model can cite page numbers.
    pub fn from_pages<'a>(pages: impl IntoIterator<Item = &'a Page>) -> Self {
        let mut content = Content::default();
        for page in pages {
            match &page.content {
                PageContent::Text(t) => {
                    if !content.text.is_empty() {
                        content.text.push_str("\n\n");
                    }
                    content.text.push_str(&format!("--- Page {} ---\n", page.index));
                    content.text.push_str(t.trim());
                }
                PageContent::Image(img) => content.images.push(img.clone()),
            }
        }
        content
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("text_len", &self.text.len())
            .field("images", &self.images.len())
            .finish()
    }
}

/// A candidate logical document inside a multi-page input.
///
/// Page indices are untrusted until [`crate::pipeline::sanitize::sanitize`]
/// has run over the group list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub label: Option<String>,
    pub pages: Vec<usize>,
    pub confidence: Option<f64>,
    /// Set by the sanitizer when it had to correct `pages`.
    #[serde(skip)]
    pub modified: bool,
}

impl DocumentGroup {
    pub fn new(pages: Vec<usize>) -> Self {
        Self {
            label: None,
            pages,
            confidence: None,
            modified: false,
        }
    }

    pub fn labelled(label: impl Into<String>, pages: Vec<usize>, confidence: Option<f64>) -> Self {
        Self {
            label: Some(label.into()),
            pages,
            confidence,
            modified: false,
        }
    }

    /// Collect this group's pages from the loaded page list, in group order.
    pub fn select<'a>(&self, pages: &'a [Page]) -> Vec<&'a Page> {
        self.pages
            .iter()
            .filter_map(|&i| pages.iter().find(|p| p.index == i))
            .collect()
    }
}
