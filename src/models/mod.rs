//! Data models
//!
//! Entities persisted in the document store (posts, comments, users,
//! sessions) plus the derived analytics types computed from them.

mod comment;
mod metrics;
mod post;
mod session;
mod tag;
mod user;

pub use comment::{Comment, CreateCommentInput, MAX_MESSAGE_CHARS};
pub use metrics::{
    AnalyticsSummary, PageStat, TagShare, TrafficPeriod, TrafficSample, VisitOutcome, VISITS_METRIC,
};
pub use post::{BlogPost, CreatePostInput, PostDetail, PostSummary, UpdatePostInput};
pub use session::Session;
pub use tag::{TagField, TagSet, TagStat};
pub use user::{Credentials, User};
