//! Remote resource models.
//!
//! Only the fields the sync needs are typed. Everything the server sent is
//! kept verbatim in [`Record::raw`] so the metadata history stores exactly
//! what was fetched, including fields this crate has never heard of.

use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Deref;

/// A typed view of a remote object, plus the raw JSON it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    raw: Value,
    inner: T,
}
impl<T> Record<T> {
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_parts(self) -> (T, Value) {
        (self.inner, self.raw)
    }
}
impl<T> Deref for Record<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}
impl<T: DeserializeOwned> TryFrom<Value> for Record<T> {
    type Error = serde_json::Error;
    fn try_from(raw: Value) -> Result<Self, Self::Error> {
        let inner = T::deserialize(&raw)?;
        Ok(Self { raw, inner })
    }
}
impl<'de, T: DeserializeOwned> Deserialize<'de> for Record<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Record::<T>::try_from(raw).map_err(D::Error::custom)
    }
}

// https://developerdocs.instructure.com/services/canvas/resources/courses#course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: u64,
    /// Missing for courses the user can no longer access (restricted by date).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
}

// https://developerdocs.instructure.com/services/canvas/resources/files#folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub parent_folder_id: Option<u64>,
}

// https://developerdocs.instructure.com/services/canvas/resources/files#file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    pub filename: String,
    /// Signed download link. Empty or absent when the file is locked for the user.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}
impl File {
    /// The download URL, if the file can actually be downloaded.
    pub fn download_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}

// https://developerdocs.instructure.com/services/canvas/resources/modules#module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

// https://developerdocs.instructure.com/services/canvas/resources/modules#moduleitem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleItem {
    pub id: u64,
    pub module_id: u64,
    #[serde(default)]
    pub title: Option<String>,
    /// `File`, `Page`, `Discussion`, `Assignment`, `Quiz`, `SubHeader`, `ExternalUrl` or `ExternalTool`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_keeps_unknown_fields() {
        let raw = json!({
            "id": 12,
            "name": "Week 1",
            "full_name": "course files/Week 1",
            "parent_folder_id": 3,
            "files_count": 4,
            "locked": false,
        });
        let record: Record<Folder> = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.parent_folder_id, Some(3));
        assert_eq!(record.raw(), &raw);
    }

    #[test]
    fn test_record_requires_typed_fields() {
        let result = serde_json::from_value::<Record<File>>(json!({ "id": 1 }));
        assert!(result.is_err(), "files without a filename are rejected");
    }

    #[test]
    fn test_restricted_course() {
        let record: Record<Course> =
            serde_json::from_value(json!({ "id": 9, "access_restricted_by_date": true })).unwrap();
        assert_eq!(record.name, None);
    }

    #[test]
    fn test_locked_file_has_no_download_url() {
        let file: File = serde_json::from_value(json!({ "id": 1, "filename": "a.pdf", "url": "" })).unwrap();
        assert_eq!(file.download_url(), None);
        let file: File =
            serde_json::from_value(json!({ "id": 1, "filename": "a.pdf", "url": "https://x/files/1/download" }))
                .unwrap();
        assert_eq!(file.download_url(), Some("https://x/files/1/download"));
    }

    #[test]
    fn test_module_item_type_field() {
        let item: ModuleItem =
            serde_json::from_value(json!({ "id": 5, "module_id": 2, "type": "SubHeader", "title": "Readings" }))
                .unwrap();
        assert_eq!(item.kind, "SubHeader");
        assert_eq!(item.content_id, None);
    }
}
