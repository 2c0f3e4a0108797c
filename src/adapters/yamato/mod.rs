pub mod gateway;
pub mod page;

pub use gateway::YamatoBrowserGateway;
pub use page::{YamatoCompactPage, YamatoIssue};
