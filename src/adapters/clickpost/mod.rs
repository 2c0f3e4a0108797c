pub mod gateway;
pub mod page;

pub use gateway::ClickPostBrowserGateway;
pub use page::{ClickPostIssue, ClickPostPage};
