// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page assembler — builds a new PDF out of pages taken from existing
// documents, using the `lopdf` crate.

use std::path::Path;

use docclip_core::error::{ClipperError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// A4 in points, for pages that carry no MediaBox anywhere in their tree.
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 595, 842];

/// Accumulates pages from any number of source documents into a single
/// output document.
///
/// Sources are moved in wholesale with [`import`](Self::import); the pages
/// are then appended one by one, in any order and any number of times.
/// Objects no page ends up referencing are pruned on save.
pub struct PageAssembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    /// MediaBox of the most recently appended page.
    last_media_box: Option<Object>,
}

impl PageAssembler {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            last_media_box: None,
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Move every object of `source` into the output and return its page ids
    /// in page order.
    pub fn import(&mut self, mut source: Document) -> Vec<ObjectId> {
        source.renumber_objects_with(self.document.max_id + 1);
        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();

        self.document.max_id = self.document.max_id.max(source.max_id);
        self.document.objects.extend(source.objects);

        debug!(pages = page_ids.len(), "Source document imported");
        page_ids
    }

    /// Append an imported page, turning it counter-clockwise by `rotation`
    /// degrees. Inherited attributes are copied onto the page so it no longer
    /// depends on its original page tree.
    pub fn append_page(&mut self, page_id: ObjectId, rotation: i32) -> Result<()> {
        let mut page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| {
                ClipperError::PdfError(format!("cannot read page object {:?}: {}", page_id, err))
            })?
            .clone();

        for key in INHERITABLE_KEYS {
            if !page.has(key)
                && let Some(value) = self.inherited_attribute(&page, key)
            {
                page.set(key, value);
            }
        }

        if rotation != 0 {
            if rotation % 90 != 0 {
                warn!(rotation, "Rotation is not a multiple of 90 degrees");
            }
            let existing = page
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0);
            let rotated = (existing - i64::from(rotation)).rem_euclid(360);
            page.set("Rotate", Object::Integer(rotated));
        }

        page.set("Parent", Object::Reference(self.pages_id));
        self.last_media_box = Some(page.get(b"MediaBox").cloned().unwrap_or_else(|_| {
            debug!(?page_id, "Page has no MediaBox, blank pages after it default to A4");
            default_media_box()
        }));

        let id = self.document.add_object(page);
        self.kids.push(Object::Reference(id));
        Ok(())
    }

    /// Append an empty page the size of the last appended one, or A4 when
    /// that page has no MediaBox. Does nothing when no page has been
    /// appended yet.
    pub fn append_blank_page(&mut self) -> bool {
        let Some(media_box) = self.last_media_box.clone() else {
            warn!("No page to size a blank page after, skipping it");
            return false;
        };
        let id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Resources" => Dictionary::new(),
        });
        self.kids.push(Object::Reference(id));
        true
    }

    /// Build the page tree and catalog, and write the document to `path`.
    #[instrument(skip_all, fields(path = %path.display(), pages = self.kids.len()))]
    pub fn save(mut self, path: &Path) -> Result<()> {
        let count = self.kids.len() as i64;
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        let pruned = self.document.prune_objects();
        debug!(pruned = pruned.len(), "Unreferenced objects pruned");

        let mut output = Vec::new();
        self.document.save_to(&mut output).map_err(|err| {
            ClipperError::PdfError(format!("failed to serialise {}: {}", path.display(), err))
        })?;
        std::fs::write(path, &output)?;

        info!(bytes = output.len(), "Wrote PDF");
        Ok(())
    }

    fn inherited_attribute(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        for _ in 0..MAX_TREE_DEPTH {
            let node = self.document.get_dictionary(parent?).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }
}

fn default_media_box() -> Object {
    Object::Array(DEFAULT_MEDIA_BOX.iter().map(|&v| Object::Integer(v)).collect())
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{page_dictionaries, write_pdf};

    #[test]
    fn appends_pages_from_several_documents() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        write_pdf(&a, 2);
        write_pdf(&b, 3);

        let mut assembler = PageAssembler::new();
        for source in [&a, &b] {
            let ids = assembler.import(Document::load(source).unwrap());
            for id in ids {
                assembler.append_page(id, 0).unwrap();
            }
        }
        assert_eq!(assembler.page_count(), 5);

        let out = dir.path().join("out.pdf");
        assembler.save(&out).unwrap();
        assert_eq!(Document::load(&out).unwrap().get_pages().len(), 5);
    }

    #[test]
    fn inherited_attributes_are_flattened() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        write_pdf(&a, 1);

        let mut assembler = PageAssembler::new();
        let ids = assembler.import(Document::load(&a).unwrap());
        assembler.append_page(ids[0], 0).unwrap();
        let out = dir.path().join("out.pdf");
        assembler.save(&out).unwrap();

        let pages = page_dictionaries(&out);
        assert!(pages[0].has(b"MediaBox"));
        assert!(pages[0].has(b"Resources"));
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        write_pdf(&a, 1);

        let mut assembler = PageAssembler::new();
        let ids = assembler.import(Document::load(&a).unwrap());
        assembler.append_page(ids[0], 90).unwrap();
        assembler.append_page(ids[0], -90).unwrap();
        assembler.append_page(ids[0], 0).unwrap();
        let out = dir.path().join("out.pdf");
        assembler.save(&out).unwrap();

        let rotations: Vec<Option<i64>> = page_dictionaries(&out)
            .iter()
            .map(|page| page.get(b"Rotate").and_then(Object::as_i64).ok())
            .collect();
        assert_eq!(rotations, vec![Some(270), Some(90), None]);
    }

    #[test]
    fn blank_page_copies_last_page_size() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        write_pdf(&a, 1);

        let mut assembler = PageAssembler::new();
        assert!(!assembler.append_blank_page());
        let ids = assembler.import(Document::load(&a).unwrap());
        assembler.append_page(ids[0], 0).unwrap();
        assert!(assembler.append_blank_page());
        let out = dir.path().join("out.pdf");
        assembler.save(&out).unwrap();

        let pages = page_dictionaries(&out);
        assert_eq!(pages.len(), 2);
        assert_eq!(
            format!("{:?}", pages[0].get(b"MediaBox").unwrap()),
            format!("{:?}", pages[1].get(b"MediaBox").unwrap())
        );
        assert!(!pages[1].has(b"Contents"));
    }

    #[test]
    fn blank_page_after_page_without_media_box_is_a4() {
        let mut source = Document::with_version("1.5");
        let pages_id = source.new_object_id();
        let page_id = source.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        source.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => 1,
            }),
        );
        let catalog_id = source.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        source.trailer.set("Root", catalog_id);

        let mut assembler = PageAssembler::new();
        let ids = assembler.import(source);
        assembler.append_page(ids[0], 0).unwrap();
        assert!(assembler.append_blank_page());
        assert_eq!(assembler.page_count(), 2);

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");
        assembler.save(&out).unwrap();
        let pages = page_dictionaries(&out);
        assert_eq!(pages.len(), 2);
        assert_eq!(
            format!("{:?}", pages[1].get(b"MediaBox").unwrap()),
            format!("{:?}", default_media_box())
        );
    }
}
