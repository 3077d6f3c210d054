//! Database repositories
//!
//! One repository per collection. Each exposes an `async_trait` interface and
//! a `Sqlx*` implementation that dispatches on the pool's driver.

pub mod comment;
pub mod metrics;
pub mod post;
pub mod session;
pub mod user;
pub mod visit_claim;

pub use comment::{CommentRepository, SqlxCommentRepository};
pub use metrics::{MetricsRepository, SqlxMetricsRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use visit_claim::{SqlxVisitClaimRepository, VisitClaimRepository};
