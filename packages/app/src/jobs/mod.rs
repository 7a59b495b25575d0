//! Concrete job kinds.

mod hello;
mod user_mail;

use actors::JobKind;

pub use hello::{HelloJob, HelloJobData};
pub use user_mail::{
    Address, InMemoryUserDirectory, LogMailSender, MailSender, User, UserDirectory, UserMailJob,
    UserMailJobData, UserMailReturn,
};

/// Every job kind this application knows about.
pub const KINDS: [JobKind; 2] = [HelloJob::KIND, UserMailJob::KIND];
