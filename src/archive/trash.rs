//! Ownership container for resources created during one traversal.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use tempfile::TempPath;

use super::archiver::Archiver;

/// One disposable resource.
pub enum TrashItem {
    Archiver(Arc<dyn Archiver>),
    TempFile(TempPath),
}

impl TrashItem {
    fn dispose(self) {
        match self {
            TrashItem::Archiver(archiver) => archiver.dispose(),
            TrashItem::TempFile(path) => {
                let display = path.display().to_string();
                if let Err(e) = path.close() {
                    warn!("failed to remove temp file {display}: {e}");
                }
            }
        }
    }
}

impl fmt::Debug for TrashItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrashItem::Archiver(a) => write!(f, "Archiver({})", a.system_path().display()),
            TrashItem::TempFile(p) => write!(f, "TempFile({})", p.display()),
        }
    }
}

/// Register every resource right after creating it, before anything that can fail.
/// [`TrashBox::clean_up`] releases them in reverse creation order exactly once; it also runs on
/// drop, so early returns and `?` paths are covered.
///
/// Not thread-safe by intent: one traversal owns one box.
#[derive(Default)]
pub struct TrashBox {
    items: Vec<TrashItem>,
}

impl TrashBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, item: TrashItem) {
        self.items.push(item);
    }

    pub fn add_archiver(&mut self, archiver: Arc<dyn Archiver>) {
        self.add(TrashItem::Archiver(archiver));
    }

    pub fn add_temp_file(&mut self, path: TempPath) {
        self.add(TrashItem::TempFile(path));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Move everything from `other` into this box, keeping creation order.
    pub fn absorb(&mut self, mut other: TrashBox) {
        self.items.append(&mut other.items);
    }

    pub fn clean_up(&mut self) {
        if self.items.is_empty() {
            return;
        }
        debug!("trash box: disposing {} item(s)", self.items.len());
        while let Some(item) = self.items.pop() {
            item.dispose();
        }
    }
}

impl fmt::Debug for TrashBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl Drop for TrashBox {
    fn drop(&mut self) {
        self.clean_up();
    }
}
