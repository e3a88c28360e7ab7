pub mod error;
pub mod handler;
pub mod locks;
pub mod rewriter;
pub mod rules;

pub use error::RewriteError;
pub use handler::{Invocation, SubConverter};
pub use locks::{LockTable, splice};
pub use rewriter::{Rewriter, RunOptions};
pub use rules::{Placeholder, Rule, RuleSet};
