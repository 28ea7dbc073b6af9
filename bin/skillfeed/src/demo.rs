//! Seed data for running the binary without a server.

use chrono::{Duration, Utc};
use sf_api_memory::{MemoryCommunityApi, MemoryInteractableApi};
use sf_core::{AuthToken, Comment, Comments, Community, Like, Likes, Post, Session};
use uuid::Uuid;

pub fn session() -> Session {
    Session::new(Uuid::now_v7(), "you", AuthToken::new("demo-token"))
        .following([Uuid::now_v7(), Uuid::now_v7()])
}

pub fn seed(session: &Session) -> (MemoryInteractableApi<Post>, MemoryCommunityApi) {
    let now = Utc::now();
    let stranger = Uuid::now_v7();
    let mut authors = session.following.iter().copied().chain(std::iter::once(stranger));
    let first = authors.next().unwrap_or(stranger);
    let second = authors.next().unwrap_or(stranger);

    let post = |author: Uuid, name: &str, content: &str, hours: i64, fans: &[Uuid]| Post {
        id: Uuid::now_v7(),
        author_id: author,
        user_name: name.into(),
        content: content.into(),
        media_url: None,
        category: Some("Programming".into()),
        created_at: now - Duration::hours(hours),
        updated_at: None,
        likes: Likes::from(fans.iter().map(|u| Like::new(*u, now)).collect::<Vec<_>>()),
        comments: Comments::default(),
    };

    let mut borrow_checker = post(first, "ada", "Finally understood the borrow checker", 5, &[second, session.user_id]);
    borrow_checker.comments = Comments::from(vec![Comment {
        id: Uuid::now_v7(),
        author_id: second,
        content: "Took me a month too".into(),
        created_at: now - Duration::hours(4),
        updated_at: None,
    }]);

    let posts = vec![
        borrow_checker,
        post(second, "grace", "Notes from my compiler course, week 3", 2, &[first]),
        post(stranger, "mallory", "You should not see this in your feed", 1, &[]),
    ];

    let community = |name: &str, category: &str, is_private: bool, members: Vec<Uuid>| Community {
        id: Uuid::now_v7(),
        name: name.into(),
        description: String::new(),
        category: category.into(),
        is_private,
        member_ids: members,
        created_at: now - Duration::days(30),
    };
    let communities = vec![
        community("Rustaceans", "Programming", false, vec![first, session.user_id]),
        community("Sourdough", "Cooking", false, vec![second]),
        community("Compiler Nerds", "Programming", true, vec![second, session.user_id]),
        community("Night Owls", "Lifestyle", true, vec![stranger]),
    ];

    (MemoryInteractableApi::new(posts), MemoryCommunityApi::new(communities))
}
