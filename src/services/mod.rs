pub mod auth;
pub mod comment;
pub mod database;
pub mod engagement;
pub mod follow;
pub mod memory;
pub mod post;
pub mod query;
pub mod ranking;
pub mod store;
pub mod user;

// 重新导出常用类型
pub use auth::AuthService;
pub use comment::CommentService;
pub use database::Database;
pub use engagement::EngagementService;
pub use follow::FollowService;
pub use memory::MemoryStore;
pub use post::PostService;
pub use query::QueryCoordinator;
pub use ranking::RankingEngine;
pub use store::{BlogStore, DynStore};
pub use user::UserService;
