//! Infrastructure shared by every domain: the dependency container, external
//! service clients, the cache, the job queue, and the cron scheduler.

pub mod cache;
pub mod deps;
pub mod facebook_client;
pub mod google_client;
pub mod jobs;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use cache::CacheService;
pub use deps::{ServerDeps, TwilioAdapter};
pub use facebook_client::{FacebookClient, NoopFacebookClient};
pub use google_client::{GoogleClient, NoopCalendarClient};
pub use scheduled_tasks::{is_valid_cron, start_scheduler, ScheduleRegistry};
pub use test_dependencies::TestDependencies;
pub use traits::*;
