//! The closed set of resource kinds the store keeps history for.
//!
//! Each [`ResourceKind`] carries a static [`Schema`] (table name and identity
//! columns) and its own normalization. The uninhabited marker types
//! ([`Course`], [`Folder`], ...) tie a kind to the Rust type of its identity
//! so that a [`Table`](crate::Table) cannot be queried with the wrong shape
//! of key.

use derive_more::Display;
use serde_json::Value;
use std::fmt::Debug;
use std::hash::Hash;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    #[display("course")]
    Course,
    #[display("folder")]
    Folder,
    #[display("file")]
    File,
    #[display("module")]
    Module,
    #[display("module item")]
    ModuleItem,
}

/// Static description of one kind's history table.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub table: &'static str,
    /// Identity columns, in the order [`Identity::keys`] yields them.
    pub keys: &'static [&'static str],
}

const COURSE: Schema = Schema { table: "course", keys: &["id"] };
const FOLDER: Schema = Schema { table: "folder", keys: &["id"] };
const FILE: Schema = Schema { table: "file", keys: &["id"] };
const MODULE: Schema = Schema { table: "module", keys: &["id", "course_id"] };
const MODULE_ITEM: Schema = Schema {
    table: "moduleitem",
    keys: &["id", "course_id", "module_id"],
};

impl ResourceKind {
    pub const ALL: [Self; 5] = [Self::Course, Self::Folder, Self::File, Self::Module, Self::ModuleItem];

    pub const fn schema(self) -> &'static Schema {
        match self {
            Self::Course => &COURSE,
            Self::Folder => &FOLDER,
            Self::File => &FILE,
            Self::Module => &MODULE,
            Self::ModuleItem => &MODULE_ITEM,
        }
    }

    /// The projection of `payload` that change detection hashes.
    ///
    /// Strips fields that change on every fetch without the resource itself
    /// changing (signed URL tokens).
    pub fn normalize(self, payload: &Value) -> Value {
        let mut normalized = payload.clone();
        match self {
            Self::Course => {
                crate::normalize::strip_query_param(&mut normalized, "image_download_url", "token");
                crate::normalize::strip_query_param(&mut normalized, "banner_image_download_url", "token");
            },
            Self::File => crate::normalize::strip_query_param(&mut normalized, "url", "verifier"),
            Self::Folder | Self::Module | Self::ModuleItem => {},
        }
        normalized
    }
}

/// The key naming one resource instance within its kind.
pub trait Identity: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    const ARITY: usize;
    /// Key values, in [`Schema::keys`] order.
    fn keys(&self) -> Vec<u64>;
}

impl Identity for u64 {
    const ARITY: usize = 1;
    fn keys(&self) -> Vec<u64> {
        vec![*self]
    }
}

/// A module, scoped to its course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId {
    pub id: u64,
    pub course_id: u64,
}
impl Identity for ModuleId {
    const ARITY: usize = 2;
    fn keys(&self) -> Vec<u64> {
        vec![self.id, self.course_id]
    }
}

/// A module item, scoped to its module and course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleItemId {
    pub id: u64,
    pub course_id: u64,
    pub module_id: u64,
}
impl Identity for ModuleItemId {
    const ARITY: usize = 3;
    fn keys(&self) -> Vec<u64> {
        vec![self.id, self.course_id, self.module_id]
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Ties a [`ResourceKind`] to its identity type.
pub trait Resource: sealed::Sealed + Debug + Send + Sync + 'static {
    const KIND: ResourceKind;
    type Id: Identity;
}

macro_rules! resource {
    ($name:ident, $kind:ident, $id:ty) => {
        #[derive(Debug, Clone, Copy)]
        pub enum $name {}
        impl sealed::Sealed for $name {}
        impl Resource for $name {
            const KIND: ResourceKind = ResourceKind::$kind;
            type Id = $id;
        }
    };
}

resource!(Course, Course, u64);
resource!(Folder, Folder, u64);
resource!(File, File, u64);
resource!(Module, Module, ModuleId);
resource!(ModuleItem, ModuleItem, ModuleItemId);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn arity<R: Resource>() -> usize {
        <R::Id as Identity>::ARITY
    }

    #[rstest]
    #[case(ResourceKind::Course, arity::<Course>())]
    #[case(ResourceKind::Folder, arity::<Folder>())]
    #[case(ResourceKind::File, arity::<File>())]
    #[case(ResourceKind::Module, arity::<Module>())]
    #[case(ResourceKind::ModuleItem, arity::<ModuleItem>())]
    fn test_identity_matches_schema(#[case] kind: ResourceKind, #[case] arity: usize) {
        assert_eq!(kind.schema().keys.len(), arity);
        assert_eq!(kind.schema().keys[0], "id");
    }

    #[test]
    fn test_identity_key_order() {
        let id = ModuleItemId { id: 3, course_id: 1, module_id: 2 };
        assert_eq!(id.keys(), vec![3, 1, 2]);
    }

    #[test]
    fn test_file_normalization_strips_verifier() {
        let payload = json!({ "id": 1, "url": "https://x.example.com/files/1/download?download_frd=1&verifier=abc" });
        let normalized = ResourceKind::File.normalize(&payload);
        assert_eq!(normalized["url"], "https://x.example.com/files/1/download?download_frd=1");
        // The input is left alone.
        assert!(payload["url"].as_str().unwrap().contains("verifier=abc"));
    }

    #[test]
    fn test_course_normalization_strips_tokens() {
        let payload = json!({
            "id": 1,
            "image_download_url": "https://x.example.com/images/1?token=abc",
            "banner_image_download_url": "https://x.example.com/images/2?token=def&size=large",
            "name": "Algebra",
        });
        let normalized = ResourceKind::Course.normalize(&payload);
        assert_eq!(normalized["image_download_url"], "https://x.example.com/images/1");
        assert_eq!(normalized["banner_image_download_url"], "https://x.example.com/images/2?size=large");
        assert_eq!(normalized["name"], "Algebra");
    }

    #[rstest]
    #[case(ResourceKind::Folder)]
    #[case(ResourceKind::Module)]
    #[case(ResourceKind::ModuleItem)]
    fn test_other_kinds_are_not_normalized(#[case] kind: ResourceKind) {
        let payload = json!({ "id": 1, "url": "https://x.example.com/a?verifier=abc&token=def" });
        assert_eq!(kind.normalize(&payload), payload);
    }
}
