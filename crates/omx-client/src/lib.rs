//! HTTP implementations of the core trait seams: run control, workflow
//! catalog, and notification delivery.

pub mod catalog;
pub mod notifier;
pub mod runs;

pub use catalog::HttpWorkflowCatalog;
pub use notifier::WebhookNotifier;
pub use runs::HttpRunService;
