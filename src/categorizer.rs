//! Partitioning of stored permission keys into entity buckets.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::catalog::EntityCatalog;
use crate::keys::PermissionKeyBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Resources,
    Pages,
    Widgets,
    Custom,
}

impl BucketKind {
    pub const ALL: [BucketKind; 4] = [
        BucketKind::Resources,
        BucketKind::Pages,
        BucketKind::Widgets,
        BucketKind::Custom,
    ];
}

/// Where one key landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket<'a> {
    Resource(&'a str),
    Page,
    Widget,
    Custom,
}

/// Total, disjoint partition of one guard's keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorizedPermissions {
    /// Subject -> keys, in first-seen subject order.
    pub resources: IndexMap<String, Vec<String>>,
    pub pages: Vec<String>,
    pub widgets: Vec<String>,
    pub custom: Vec<String>,
}

impl CategorizedPermissions {
    pub fn len(&self) -> usize {
        self.resources.values().map(Vec::len).sum::<usize>()
            + self.pages.len()
            + self.widgets.len()
            + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bucket_len(&self, kind: BucketKind) -> usize {
        match kind {
            BucketKind::Resources => self.resources.values().map(Vec::len).sum(),
            BucketKind::Pages => self.pages.len(),
            BucketKind::Widgets => self.widgets.len(),
            BucketKind::Custom => self.custom.len(),
        }
    }

    pub fn bucket_of(&self, key: &str) -> Option<Bucket<'_>> {
        if let Some((subject, _)) = self
            .resources
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| k == key))
        {
            return Some(Bucket::Resource(subject));
        }
        if self.pages.iter().any(|k| k == key) {
            return Some(Bucket::Page);
        }
        if self.widgets.iter().any(|k| k == key) {
            return Some(Bucket::Widget);
        }
        if self.custom.iter().any(|k| k == key) {
            return Some(Bucket::Custom);
        }
        None
    }

    /// Every key, bucket by bucket.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.resources
            .values()
            .flatten()
            .chain(&self.pages)
            .chain(&self.widgets)
            .chain(&self.custom)
            .map(String::as_str)
    }
}

pub fn categorize<I, S>(keys: I, catalog: &EntityCatalog, builder: &dyn PermissionKeyBuilder) -> CategorizedPermissions
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: IndexSet<String> = keys.into_iter().map(|k| k.as_ref().to_string()).collect();
    let mut out = CategorizedPermissions::default();

    for key in unique {
        let Some((_, subject)) = builder.parse(&key) else {
            out.custom.push(key);
            continue;
        };

        if catalog.resource_subjects().contains_key(subject) {
            let subject = subject.to_string();
            out.resources.entry(subject).or_default().push(key);
        } else if catalog.page_subjects().contains_key(subject) {
            out.pages.push(key);
        } else if catalog.widget_subjects().contains_key(subject) {
            out.widgets.push(key);
        } else {
            out.custom.push(key);
        }
    }

    tracing::debug!(
        panel = %catalog.panel().id,
        resources = out.resources.len(),
        pages = out.pages.len(),
        widgets = out.widgets.len(),
        custom = out.custom.len(),
        "categorized permissions"
    );

    out
}
