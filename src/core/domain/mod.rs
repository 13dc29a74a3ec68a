//! Domain types.

mod attempt;
mod grant;
mod host;
mod owner;
mod recipient;
mod slug;

pub use attempt::Attempt;
pub use grant::{GrantKey, GrantSource, KeyGrant};
pub use host::{Effect, HostSpec, KeyHostConfig, Mechanism, VaultKind};
pub use owner::Owner;
pub use recipient::{Recipient, RecipientMechanism};
pub use slug::{Env, OrgSelector, Slug, ORG_ALL, ORG_THIS};
