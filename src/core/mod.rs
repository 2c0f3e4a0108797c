pub mod issue_label;
pub mod issuer;

pub use issue_label::{IssueLabelUseCase, IssueRequest};
pub use issuer::LabelIssuer;
