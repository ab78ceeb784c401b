//! 客户端会话协调 / Client-side conversation reconciliation
//!
//! 推断当前用户、先查已加载会话再创建、从未展开的引用解析显示名。
//! Infers the current user, looks up loaded conversations before creating one and
//! resolves display names from possibly-unpopulated references.

pub mod display;
pub mod http;
pub mod identity;
pub mod profile;
pub mod reconcile;

pub use display::display_name;
pub use http::{ChatClient, ClientError};
pub use identity::current_user;
pub use profile::{ProfileCache, ProfileSource};
pub use reconcile::{find_existing, plan_open, CreationGuard, DisabledReason, OpenPlan};
