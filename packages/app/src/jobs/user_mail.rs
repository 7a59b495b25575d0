//! Templated user email job on `mailQueue`.
//!
//! The worker looks the recipient up through [`UserDirectory`] and hands the
//! rendered-template request to a [`MailSender`]. Both are ports; the user
//! model and template rendering live outside this crate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use actors::{HandlerFuture, JobDefinition, JobDispatcher, JobHandler, JobKind};
use async_trait::async_trait;
use queue_core::{Job, JobError, QueueError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMailJobData {
    pub user_id: u64,
    pub template_name: String,
    #[serde(default)]
    pub template_vars: Map<String, Value>,
}

/// Recipient as stored by the user directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

/// Mail recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub address: String,
}

/// Worker return value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMailReturn {
    pub to: Address,
    pub template_name: String,
    pub template_vars: Map<String, Value>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_id(&self, user_id: u64) -> Result<Option<User>, JobError>;
}

#[async_trait]
pub trait MailSender: Send + Sync + 'static {
    async fn send_template(
        &self,
        template_name: &str,
        to: &Address,
        vars: &Map<String, Value>,
    ) -> Result<(), JobError>;
}

/// User directory held in memory.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<u64, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        self.users
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(user.id, user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, user_id: u64) -> Result<Option<User>, JobError> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&user_id)
            .cloned())
    }
}

/// Mail sender that only logs what it would send.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send_template(
        &self,
        template_name: &str,
        to: &Address,
        vars: &Map<String, Value>,
    ) -> Result<(), JobError> {
        tracing::info!(
            to = %to.address,
            template = %template_name,
            vars = vars.len(),
            "Mail delivery skipped, no transport configured"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct UserMailJob {
    definition: JobDefinition<UserMailJobData>,
    users: Arc<dyn UserDirectory>,
    mailer: Arc<dyn MailSender>,
}

impl std::fmt::Debug for UserMailJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserMailJob")
            .field("definition", &self.definition)
            .finish()
    }
}

impl UserMailJob {
    pub const KIND: JobKind = JobKind::new("mailQueue", "UserMailWorker");

    pub fn new(
        dispatcher: JobDispatcher,
        users: Arc<dyn UserDirectory>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        Self {
            definition: JobDefinition::new(dispatcher, Self::KIND),
            users,
            mailer,
        }
    }

    pub async fn queue(&self, data: &UserMailJobData) -> Result<Job, QueueError> {
        self.definition.queue(data).await
    }

    /// Queue the welcome mail for a freshly registered user.
    pub async fn queue_new_user(&self, user_id: u64) -> Result<Job, QueueError> {
        self.queue(&UserMailJobData {
            user_id,
            template_name: "new-user".to_string(),
            template_vars: Map::new(),
        })
        .await
    }

    /// Send the templated mail to the user named in the payload.
    ///
    /// Payload problems fail before the directory or mailer is touched.
    pub async fn worker(&self, job: &Job) -> Result<UserMailReturn, JobError> {
        let data = self.definition.decode(job)?;
        if data.user_id == 0 {
            return Err(JobError::malformed("userId is missing"));
        }

        let user = self
            .users
            .find_by_id(data.user_id)
            .await?
            .ok_or_else(|| JobError::Failed(format!("User not found with id {}", data.user_id)))?;

        let to = Address {
            name: user.name.clone(),
            address: user.email.clone(),
        };
        let mut vars = data.template_vars;
        vars.insert("user".to_string(), serde_json::to_value(&user).map_err(JobError::failed)?);

        self.mailer
            .send_template(&data.template_name, &to, &vars)
            .await?;

        tracing::info!(
            queue = %job.queue_name,
            job_id = %job.id,
            "Email sent to {} using template \"{}\"",
            to.address,
            data.template_name
        );

        Ok(UserMailReturn {
            to,
            template_name: data.template_name,
            template_vars: vars,
        })
    }
}

impl JobHandler for UserMailJob {
    fn job_name(&self) -> &str {
        Self::KIND.job_name
    }

    fn handle(&self, job: &Job) -> HandlerFuture {
        let this = self.clone();
        let job = job.clone();
        Box::pin(async move {
            let sent = this.worker(&job).await?;
            serde_json::to_value(sent).map_err(JobError::failed)
        })
    }
}
