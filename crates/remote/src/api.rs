//! Typed collection endpoints used by the sync.

use crate::Client;
use crate::error::Result;
use crate::models::{Course, File, Folder, Module, ModuleItem, Record};
use crate::transport::Query;
use futures::Stream;

/// Largest page size the site honours. It ends up encoded in every `next`
/// link, so it only has to be sent once.
const PER_PAGE: &str = "100";

fn query<'a>(include: impl IntoIterator<Item = &'a str>) -> Query {
    let mut query = vec![("per_page".to_string(), PER_PAGE.to_string())];
    query.extend(include.into_iter().map(|value| ("include[]".to_string(), value.to_string())));
    query
}

impl Client {
    // https://developerdocs.instructure.com/services/canvas/resources/courses#method.courses.index
    pub fn list_courses(&self) -> impl Stream<Item = Result<Record<Course>>> + '_ {
        self.paginate(
            "courses",
            query([
                "syllabus_body",
                "public_description",
                "term",
                "account",
                "course_progress",
                "sections",
                "storage_quota_used_mb",
                "total_students",
                "teachers",
                "tabs",
                "course_image",
                "banner_image",
                "concluded",
            ]),
        )
    }

    // https://developerdocs.instructure.com/services/canvas/resources/files#method.folders.show
    pub async fn root_folder(&self, course_id: u64) -> Result<Record<Folder>> {
        self.get(&format!("courses/{course_id}/folders/root"), Query::new()).await
    }

    // https://developerdocs.instructure.com/services/canvas/resources/files#method.folders.api_index
    pub fn list_subfolders(&self, folder_id: u64) -> impl Stream<Item = Result<Record<Folder>>> + '_ {
        self.paginate(format!("folders/{folder_id}/folders"), query([]))
    }

    // https://developerdocs.instructure.com/services/canvas/resources/files#method.files.api_index
    pub fn list_folder_files(&self, folder_id: u64) -> impl Stream<Item = Result<Record<File>>> + '_ {
        self.paginate(format!("folders/{folder_id}/files"), query(["user", "usage_rights"]))
    }

    // https://developerdocs.instructure.com/services/canvas/resources/modules#method.context_modules_api.index
    pub fn list_modules(&self, course_id: u64) -> impl Stream<Item = Result<Record<Module>>> + '_ {
        self.paginate(format!("courses/{course_id}/modules"), query([]))
    }

    // https://developerdocs.instructure.com/services/canvas/resources/modules#method.context_module_items_api.index
    pub fn list_module_items(
        &self,
        course_id: u64,
        module_id: u64,
    ) -> impl Stream<Item = Result<Record<ModuleItem>>> + '_ {
        self.paginate(format!("courses/{course_id}/modules/{module_id}/items"), query(["content_details"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    #[test]
    fn test_query_includes() {
        let q = query(["user", "usage_rights"]);
        assert_eq!(q[0], ("per_page".to_string(), "100".to_string()));
        assert_eq!(q[1], ("include[]".to_string(), "user".to_string()));
        assert_eq!(q[2], ("include[]".to_string(), "usage_rights".to_string()));
    }

    #[tokio::test]
    async fn test_list_module_items_endpoint() {
        let mock = Arc::new(MockTransport::default());
        mock.page(
            "https://school.example.com/api/v1/courses/1/modules/2/items",
            json!([{ "id": 3, "module_id": 2, "type": "File", "content_id": 44 }]),
            None,
        );
        let client = Client::new(&Url::parse("https://school.example.com").unwrap(), mock.clone()).unwrap();
        let items: Vec<_> = client.list_module_items(1, 2).try_collect().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].content_id, Some(44));
    }

    #[tokio::test]
    async fn test_root_folder() {
        let mock = Arc::new(MockTransport::default());
        mock.page(
            "https://school.example.com/api/v1/courses/1/folders/root",
            json!({ "id": 10, "name": "course files", "parent_folder_id": null }),
            None,
        );
        let client = Client::new(&Url::parse("https://school.example.com").unwrap(), mock.clone()).unwrap();
        let root = client.root_folder(1).await.unwrap();
        assert_eq!(root.id, 10);
        assert_eq!(root.parent_folder_id, None);
    }
}
