//! The two-level classification tree: categories, then document types.
//!
//! Built once at start-up (from [`Taxonomy::builtin`] or a JSON file) and
//! read-only afterwards. Lookups are linear scans over a few dozen nodes, so
//! there is no index to keep in sync. Unknown names are a normal outcome and
//! return `None`.
//!
//! ## File format
//!
//! ```json
//! {
//!   "catch_all": "Other",
//!   "categories": [
//!     {"name": "identity", "description": "Identity papers", "icon": "🪪",
//!      "children": [
//!        {"name": "national_id", "description": "National ID card",
//!         "schema": {"name": "national_id", "fields": [
//!           {"name": "id_number", "description": "12-digit number"}]}}]},
//!     {"name": "Other", "description": "Anything else"}
//!   ]
//! }
//! ```

mod catalog;
pub mod schema;

pub use schema::{Schema, SchemaField};

use crate::error::DocExtractError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// One category or document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyNode {
    pub name: String,
    pub description: String,
    /// Human-readable label for listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Only document types carry a schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TaxonomyNode>,
}

impl TaxonomyNode {
    pub fn category(
        name: impl Into<String>,
        description: impl Into<String>,
        children: Vec<TaxonomyNode>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            title: None,
            icon: None,
            schema: None,
            children,
        }
    }

    pub fn doc_type(name: impl Into<String>, description: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            title: None,
            icon: None,
            schema: Some(schema),
            children: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Where a label sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution<'t> {
    pub category: &'t TaxonomyNode,
    /// `None` when the label named a category rather than a document type.
    pub doc_type: Option<&'t TaxonomyNode>,
}

impl<'t> Resolution<'t> {
    pub fn schema(&self) -> Option<&'t Schema> {
        self.doc_type.and_then(|d| d.schema.as_ref())
    }
}

fn default_catch_all() -> String {
    "Other".to_string()
}

#[derive(Deserialize)]
struct TaxonomyFile {
    #[serde(default = "default_catch_all")]
    catch_all: String,
    categories: Vec<TaxonomyNode>,
}

/// The validated classification tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Taxonomy {
    catch_all: String,
    categories: Vec<TaxonomyNode>,
}

impl Taxonomy {
    /// Build a taxonomy, checking the two-level shape.
    ///
    /// Rules: names are non-empty and unique across the whole tree,
    /// categories carry no schema, document types have no children, and the
    /// catch-all category exists with neither children nor schema.
    pub fn new(
        categories: Vec<TaxonomyNode>,
        catch_all: impl Into<String>,
    ) -> Result<Self, DocExtractError> {
        let catch_all = catch_all.into();
        let invalid = |msg: String| Err(DocExtractError::InvalidTaxonomy(msg));

        if categories.is_empty() {
            return invalid("no categories".into());
        }

        let mut seen = HashSet::new();
        for cat in &categories {
            if cat.name.trim().is_empty() {
                return invalid("category with an empty name".into());
            }
            if !seen.insert(cat.name.as_str()) {
                return invalid(format!("duplicate name '{}'", cat.name));
            }
            if cat.schema.is_some() {
                return invalid(format!("category '{}' must not carry a schema", cat.name));
            }
            for doc in &cat.children {
                if doc.name.trim().is_empty() {
                    return invalid(format!("empty document type name under '{}'", cat.name));
                }
                if !seen.insert(doc.name.as_str()) {
                    return invalid(format!("duplicate name '{}'", doc.name));
                }
                if !doc.children.is_empty() {
                    return invalid(format!(
                        "document type '{}' has children; the tree is two levels deep",
                        doc.name
                    ));
                }
            }
        }

        match categories.iter().find(|c| c.name == catch_all) {
            None => return invalid(format!("catch-all category '{catch_all}' is missing")),
            Some(c) if !c.children.is_empty() => {
                return invalid(format!("catch-all category '{catch_all}' must have no children"))
            }
            Some(_) => {}
        }

        Ok(Self {
            catch_all,
            categories,
        })
    }

    /// The Vietnamese document catalogue shipped with the crate.
    pub fn builtin() -> Self {
        Self {
            catch_all: default_catch_all(),
            categories: catalog::categories(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, DocExtractError> {
        let file: TaxonomyFile = serde_json::from_str(json)
            .map_err(|e| DocExtractError::InvalidTaxonomy(e.to_string()))?;
        Self::new(file.categories, file.catch_all)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocExtractError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            DocExtractError::InvalidTaxonomy(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn categories(&self) -> &[TaxonomyNode] {
        &self.categories
    }

    pub fn catch_all(&self) -> &TaxonomyNode {
        // `new` guarantees the catch-all exists; builtin() is covered by tests.
        self.categories
            .iter()
            .find(|c| c.name == self.catch_all)
            .unwrap_or(&self.categories[self.categories.len() - 1])
    }

    pub fn is_catch_all(&self, name: &str) -> bool {
        self.catch_all == name
    }

    /// Category that owns the document type `doc_type`.
    pub fn find_category(&self, doc_type: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.children.iter().any(|d| d.name == doc_type))
            .map(|c| c.name.as_str())
    }

    /// Schema bound to the document type `doc_type`.
    pub fn find_schema(&self, doc_type: &str) -> Option<&Schema> {
        self.categories
            .iter()
            .flat_map(|c| c.children.iter())
            .find(|d| d.name == doc_type)
            .and_then(|d| d.schema.as_ref())
    }

    /// Children of `category`; empty for leaves and unknown names.
    pub fn children_of(&self, category: &str) -> &[TaxonomyNode] {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.children.as_slice())
            .unwrap_or(&[])
    }

    /// Every document type in tree order, followed by the catch-all.
    ///
    /// This is the candidate list offered to the splitter and to the
    /// per-group classifier.
    pub fn flat_list(&self) -> Vec<&TaxonomyNode> {
        let mut list: Vec<&TaxonomyNode> = self
            .categories
            .iter()
            .flat_map(|c| c.children.iter())
            .collect();
        list.push(self.catch_all());
        list
    }

    /// Locate `label` as a document type or, failing that, a category.
    pub fn resolve(&self, label: &str) -> Option<Resolution<'_>> {
        for cat in &self.categories {
            if let Some(doc) = cat.children.iter().find(|d| d.name == label) {
                return Some(Resolution {
                    category: cat,
                    doc_type: Some(doc),
                });
            }
        }
        self.categories
            .iter()
            .find(|c| c.name == label)
            .map(|category| Resolution {
                category,
                doc_type: None,
            })
    }

    pub fn doc_type_count(&self) -> usize {
        self.categories.iter().map(|c| c.children.len()).sum()
    }

    /// Indented listing of the tree for terminals.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} categories, {} document types",
            self.categories.len(),
            self.doc_type_count()
        );
        for cat in &self.categories {
            let icon = cat.icon.as_deref().unwrap_or("📄");
            let title = cat.title.as_deref().unwrap_or(&cat.description);
            let _ = writeln!(out, "  {icon} {}: {title} ({})", cat.name, cat.children.len());
            for doc in &cat.children {
                let fields = doc.schema.as_ref().map_or(0, |s| s.fields.len());
                let _ = writeln!(out, "      └── {} ({fields} fields)", doc.name);
            }
        }
        out
    }
}
