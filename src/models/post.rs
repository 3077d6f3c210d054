//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Comment, TagSet};

/// Post entity.
///
/// `id` is assigned by the author, not by the store. Tags are already
/// normalized when a `BlogPost` exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: TagSet,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub image_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    /// Title for display, falling back to `Untitled Post`
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Post"
        } else {
            &self.title
        }
    }
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Accepts either `["a", "b"]` or `"a, b"`
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Defaults to the creation time
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// Input for updating a post; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<TagSet>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl UpdatePostInput {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.tags.is_none()
            && self.author_name.is_none()
            && self.author_email.is_none()
            && self.image_url.is_none()
            && self.published_at.is_none()
    }

    /// Apply the present fields onto `post`
    pub fn apply_to(self, post: &mut BlogPost) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(author_name) = self.author_name {
            post.author_name = Some(author_name);
        }
        if let Some(author_email) = self.author_email {
            post.author_email = Some(author_email);
        }
        if let Some(image_url) = self.image_url {
            post.image_url = Some(image_url);
        }
        if let Some(published_at) = self.published_at {
            post.published_at = published_at;
        }
    }
}

/// A post with its comment ledger and reading time, as shown to readers
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: BlogPost,
    pub comments: Vec<Comment>,
    pub reading_time: u32,
}

/// A post in a listing, with reading time attached
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: BlogPost,
    pub reading_time: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlogPost {
        let now = Utc::now();
        BlogPost {
            id: 1,
            title: "Hello".to_string(),
            content: "world".to_string(),
            tags: TagSet::parse_delimited("a, b"),
            author_name: None,
            author_email: None,
            image_url: None,
            published_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_display_title_fallback() {
        let mut post = sample();
        assert_eq!(post.display_title(), "Hello");
        post.title = "   ".to_string();
        assert_eq!(post.display_title(), "Untitled Post");
    }

    #[test]
    fn test_update_applies_only_present_fields() {
        let mut post = sample();
        let input = UpdatePostInput {
            content: Some("new body".to_string()),
            tags: Some(TagSet::parse_delimited("c")),
            ..Default::default()
        };
        assert!(!input.is_empty());
        input.apply_to(&mut post);

        assert_eq!(post.title, "Hello");
        assert_eq!(post.content, "new body");
        assert_eq!(Vec::from(post.tags), vec!["c"]);
    }

    #[test]
    fn test_create_input_accepts_string_tags() {
        let input: CreatePostInput = serde_json::from_str(
            r#"{"id": 7, "title": "T", "content": "C", "tags": "x, y"}"#,
        )
        .unwrap();
        assert_eq!(input.tags.to_string(), "x, y");
        assert!(input.published_at.is_none());
    }
}
