//! Object-created notifications and the raw-prefix acceptance rule.

use serde::Deserialize;

use super::DocumentRef;

/// Object-created notification in the EventBridge shape.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedNotification {
    /// Notification payload.
    pub detail: ObjectCreatedDetail,
}

/// Payload of an object-created notification.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectCreatedDetail {
    /// Bucket the object was written to.
    pub bucket: BucketDetail,
    /// Object that was written.
    pub object: ObjectDetail,
}

/// Bucket descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct BucketDetail {
    /// Bucket name.
    pub name: String,
}

/// Object descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectDetail {
    /// Object key.
    pub key: String,
}

/// Accepted trigger for one workflow instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Object to analyse.
    pub document_ref: DocumentRef,
    /// Uploader derived from the key, when present.
    pub owner_id: Option<String>,
}

impl Trigger {
    /// Accept `{bucket, key}` when the key sits under `raw_prefix`.
    pub fn accept(bucket: &str, key: &str, raw_prefix: &str) -> Option<Self> {
        if key.is_empty() || !key.starts_with(raw_prefix) || key.ends_with('/') {
            return None;
        }
        Some(Self {
            document_ref: DocumentRef::new(bucket, key),
            owner_id: owner_from_key(key),
        })
    }

    /// Accept an object-created notification.
    pub fn from_notification(
        notification: &ObjectCreatedNotification,
        raw_prefix: &str,
    ) -> Option<Self> {
        Self::accept(
            &notification.detail.bucket.name,
            &notification.detail.object.key,
            raw_prefix,
        )
    }
}

/// Second path segment of `raw/<owner>/<file>` keys.
pub fn owner_from_key(key: &str) -> Option<String> {
    let segments: Vec<&str> = key.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    Some(segments[1])
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_object_created_shape() {
        let notification: ObjectCreatedNotification = serde_json::from_value(json!({
            "version": "0",
            "detail-type": "Object Created",
            "source": "aws.s3",
            "detail": {
                "bucket": { "name": "uploads" },
                "object": { "key": "raw/user123/list.txt", "size": 42 }
            }
        }))
        .expect("notification");

        let trigger = Trigger::from_notification(&notification, "raw/").expect("accepted");
        assert_eq!(trigger.document_ref, DocumentRef::new("uploads", "raw/user123/list.txt"));
        assert_eq!(trigger.owner_id.as_deref(), Some("user123"));
    }

    #[test]
    fn keys_outside_prefix_are_ignored() {
        assert!(Trigger::accept("uploads", "processed/user123/list.txt", "raw/").is_none());
        assert!(Trigger::accept("uploads", "raw/user123/", "raw/").is_none());
        assert!(Trigger::accept("uploads", "", "raw/").is_none());
    }

    #[test]
    fn owner_requires_three_segments() {
        assert_eq!(owner_from_key("raw/user123/list.txt").as_deref(), Some("user123"));
        assert_eq!(owner_from_key("raw/list.txt"), None);
        assert_eq!(owner_from_key("raw//list.txt"), None);
        assert_eq!(
            owner_from_key("raw/user123/nested/list.txt").as_deref(),
            Some("user123")
        );
    }
}
