//! Mail notification middleware: sends an SMTP message on job completion.

use super::{should_notify, NotificationDedup};
use crate::execution::Execution;
use crate::job::Job;
use crate::middleware::Middleware;
use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::warn;

pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tls_skip_verify: bool,
    pub from: String,
    pub to: Vec<String>,
}

pub struct MailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
    only_on_error: bool,
    dedup: Arc<NotificationDedup>,
}

impl MailNotifier {
    pub fn new(
        config: MailConfig,
        only_on_error: bool,
        dedup: Arc<NotificationDedup>,
    ) -> anyhow::Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port);

        if let (Some(user), Some(password)) = (&config.user, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        if !config.tls_skip_verify {
            let tls = TlsParameters::new(config.host.clone())?;
            builder = builder.tls(Tls::Required(tls));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from,
            to: config.to,
            only_on_error,
            dedup,
        })
    }
}

#[async_trait]
impl Middleware for MailNotifier {
    async fn after(&self, _job: &Job, execution: &mut Execution) {
        let Some(body) = should_notify(execution, self.only_on_error, &self.dedup) else {
            return;
        };

        let subject = if execution.failed {
            format!("cronyx: job '{}' failed", execution.job_name)
        } else {
            format!("cronyx: job '{}' succeeded", execution.job_name)
        };

        let from = match self.from.parse() {
            Ok(mailbox) => mailbox,
            Err(error) => {
                warn!(job = %execution.job_name, %error, "invalid mail 'from' address");
                return;
            }
        };
        let mut builder = Message::builder().subject(subject).from(from);
        for to in &self.to {
            builder = match to.parse() {
                Ok(mailbox) => builder.to(mailbox),
                Err(error) => {
                    warn!(job = %execution.job_name, %to, %error, "invalid mail 'to' address, skipping");
                    continue;
                }
            };
        }

        let message = match builder.body(body) {
            Ok(message) => message,
            Err(error) => {
                warn!(job = %execution.job_name, %error, "failed to build mail message");
                return;
            }
        };

        if let Err(error) = self.transport.send(message).await {
            warn!(job = %execution.job_name, %error, "failed to send mail notification");
        }
    }
}
