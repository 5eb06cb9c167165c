use std::sync::Arc;

use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::time::{sleep, Duration};

use super::sendmail::{retry_delay, MailError, MailJob, Mailer, MAX_RETRIES};

pub const QUEUE_KEY: &str = "mail:queue";
pub const DEAD_LETTER_KEY: &str = "mail:dead_letter";
pub const BAD_PAYLOAD_KEY: &str = "mail:bad_payloads";

/// Outgoing email. With Redis, jobs go to `mail:queue` and a worker task
/// drains it; without Redis each job is sent on its own spawned task.
#[derive(Clone)]
pub struct MailQueue {
    mailer: Arc<Mailer>,
    redis: Option<ConnectionManager>,
    idle_sleep: Duration,
}

/// What the worker does with a job after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RetryPlan {
    Retry { attempt: u32, delay: Duration },
    DeadLetter,
}

pub fn plan_retry(job: &MailJob) -> RetryPlan {
    if job.attempts < MAX_RETRIES {
        let attempt = job.attempts + 1;
        RetryPlan::Retry {
            attempt,
            delay: retry_delay(attempt),
        }
    } else {
        RetryPlan::DeadLetter
    }
}

impl MailQueue {
    pub fn new(mailer: Arc<Mailer>, redis: Option<ConnectionManager>) -> Self {
        Self {
            mailer,
            redis,
            idle_sleep: Duration::from_secs(2),
        }
    }

    /// Never fails the caller; delivery problems are logged.
    pub async fn enqueue(&self, job: MailJob) {
        if let Some(mut conn) = self.redis.clone() {
            match push(&mut conn, &job).await {
                Ok(()) => {
                    tracing::debug!("queued email '{}' for {}", job.subject, job.to);
                    return;
                }
                Err(e) => {
                    tracing::warn!("could not queue email for {}: {}, sending inline", job.to, e);
                }
            }
        }

        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let _ = mailer.send_with_retries(&job).await;
        });
    }

    /// For mail the caller cannot do without: the job is pushed to the queue,
    /// or sent once right away, and the caller hears about a failure.
    pub async fn deliver(&self, job: MailJob) -> Result<(), MailError> {
        if let Some(mut conn) = self.redis.clone() {
            match push(&mut conn, &job).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("could not queue email for {}: {}, sending inline", job.to, e);
                }
            }
        }

        self.mailer.send(&job).await
    }

    /// Worker loop; returns when `shutdown` resolves.
    pub async fn run_forever(&self, shutdown: impl std::future::Future<Output = ()>) {
        let Some(conn) = self.redis.clone() else {
            tracing::info!("MailQueue: Redis not configured, worker not started");
            return;
        };
        let mut conn = conn;
        let mut shutdown = Box::pin(shutdown);

        tracing::info!("MailQueue: worker listening on {}", QUEUE_KEY);

        loop {
            if futures::future::poll_immediate(&mut shutdown).await.is_some() {
                tracing::info!("MailQueue: shutdown requested, exiting loop");
                break;
            }

            match redis::cmd("BRPOP")
                .arg(QUEUE_KEY)
                .arg(5)
                .query_async::<_, Option<(String, String)>>(&mut conn)
                .await
            {
                Ok(Some((_key, payload))) => self.process(&mut conn, payload).await,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("MailQueue: redis brpop error: {}", e);
                    sleep(self.idle_sleep).await;
                }
            }
        }

        tracing::info!("MailQueue: stopped");
    }

    async fn process(&self, conn: &mut ConnectionManager, payload: String) {
        let mut job = match serde_json::from_str::<MailJob>(&payload) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("MailQueue: invalid payload: {} ; payload: {}", e, payload);
                let _: Result<(), _> = conn.lpush(BAD_PAYLOAD_KEY, &payload).await;
                return;
            }
        };

        let Err(e) = self.mailer.send(&job).await else {
            return;
        };

        match plan_retry(&job) {
            RetryPlan::Retry { attempt, delay } => {
                tracing::warn!(
                    "MailQueue: email to {} failed ({}), retry {} in {:?}",
                    job.to,
                    e,
                    attempt,
                    delay
                );
                job.attempts = attempt;
                let mut conn = conn.clone();
                tokio::spawn(async move {
                    sleep(delay).await;
                    if let Err(e) = push(&mut conn, &job).await {
                        tracing::error!("MailQueue: could not requeue email to {}: {}", job.to, e);
                    }
                });
            }
            RetryPlan::DeadLetter => {
                tracing::error!(
                    "MailQueue: email to {} failed after {} retries: {}",
                    job.to,
                    MAX_RETRIES,
                    e
                );
                let _: Result<(), _> = conn.lpush(DEAD_LETTER_KEY, &payload).await;
            }
        }
    }
}

async fn push(conn: &mut ConnectionManager, job: &MailJob) -> Result<(), MailError> {
    let payload = serde_json::to_string(job)?;
    conn.lpush::<_, _, ()>(QUEUE_KEY, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::sendmail::MailTemplate;

    fn job(attempts: u32) -> MailJob {
        MailJob {
            to: "a@b.pk".to_string(),
            subject: "s".to_string(),
            template: MailTemplate::Welcome,
            placeholders: vec![],
            attempts,
        }
    }

    #[test]
    fn three_retries_then_dead_letter() {
        assert_eq!(
            plan_retry(&job(0)),
            RetryPlan::Retry { attempt: 1, delay: Duration::from_secs(2) }
        );
        assert_eq!(
            plan_retry(&job(2)),
            RetryPlan::Retry { attempt: 3, delay: Duration::from_secs(8) }
        );
        assert_eq!(plan_retry(&job(3)), RetryPlan::DeadLetter);
    }
}
