pub mod middleware;
pub mod serde_helpers;
pub mod slug;
pub mod text;
pub mod validation;
