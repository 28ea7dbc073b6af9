//! Builders shared by the scenario tests.
#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use sf_core::{AuthToken, Comment, Comments, Community, LearningPlan, Likes, Post, ProgressEntry, Session};
use uuid::Uuid;

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn session() -> Session {
    Session::new(Uuid::now_v7(), "ada", AuthToken::new("session-token"))
}

pub fn post(author: Uuid, content: &str, minutes: i64) -> Post {
    Post {
        id: Uuid::now_v7(),
        author_id: author,
        user_name: "author".into(),
        content: content.into(),
        media_url: None,
        category: None,
        created_at: epoch() + Duration::minutes(minutes),
        updated_at: None,
        likes: Likes::default(),
        comments: Comments::default(),
    }
}

pub fn comment(author: Uuid, content: &str) -> Comment {
    Comment {
        id: Uuid::now_v7(),
        author_id: author,
        content: content.into(),
        created_at: epoch(),
        updated_at: None,
    }
}

pub fn plan(author: Uuid, title: &str) -> LearningPlan {
    LearningPlan {
        id: Uuid::now_v7(),
        author_id: author,
        user_name: "author".into(),
        title: title.into(),
        description: String::new(),
        topics: "ownership, lifetimes".into(),
        resources: String::new(),
        category: Some("Programming".into()),
        created_at: epoch(),
        updated_at: None,
        likes: Likes::default(),
        comments: Comments::default(),
    }
}

pub fn progress(author: Uuid, plan_id: Option<Uuid>, title: &str, minutes: i64) -> ProgressEntry {
    ProgressEntry {
        id: Uuid::now_v7(),
        author_id: author,
        user_name: "author".into(),
        learning_plan_id: plan_id,
        title: title.into(),
        content: String::new(),
        category: None,
        created_at: epoch() + Duration::minutes(minutes),
        updated_at: None,
        likes: Likes::default(),
        comments: Comments::default(),
    }
}

pub fn community(name: &str, is_private: bool, members: Vec<Uuid>) -> Community {
    Community {
        id: Uuid::now_v7(),
        name: name.into(),
        description: format!("{name} community"),
        category: "Programming".into(),
        is_private,
        member_ids: members,
        created_at: epoch(),
    }
}
