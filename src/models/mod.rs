pub mod comment;
pub mod follow;
pub mod like;
pub mod pagination;
pub mod post;
pub mod user;
