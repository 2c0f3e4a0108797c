pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::adapters::browser::{BrowserFactory, BrowserPage, Locator, WebDriverFactory};
pub use crate::adapters::clickpost::ClickPostBrowserGateway;
pub use crate::adapters::store::{MemoryLabelStore, MemoryOrderStore};
pub use crate::adapters::yamato::YamatoBrowserGateway;
pub use crate::config::{AutomationConfig, CarrierCredentials, CliConfig};
pub use crate::core::{IssueLabelUseCase, IssueRequest, LabelIssuer};
pub use crate::domain::model::{IssueResult, Order, ShippingLabel, ShippingMethod};
pub use crate::utils::error::{ErrorKind, IssueError, Result};
