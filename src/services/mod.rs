//! Services layer
//!
//! Business rules over the repositories: post reads and admin edits, the
//! comment ledger, visit counting, derived analytics, the live feed and the
//! identity boundary.

pub mod analytics;
pub mod comment;
pub mod error;
pub mod feed;
pub mod identity;
pub mod password;
pub mod post;
pub mod rate_limiter;
pub mod reading_time;
pub mod visit;

pub use analytics::{compute_tag_stats, compute_top_pages, synthesize_traffic, AnalyticsService};
pub use comment::CommentService;
pub use error::ServiceError;
pub use feed::{ChangeBus, ChangeEvent, LiveQuery, PostFeed, Snapshot, Subscription};
pub use identity::{
    AuthContext, AuthError, AuthEvent, AuthSession, IdentityProvider, LocalIdentityProvider,
};
pub use password::{hash_password, verify_password};
pub use post::PostService;
pub use rate_limiter::LoginRateLimiter;
pub use visit::VisitCounter;
