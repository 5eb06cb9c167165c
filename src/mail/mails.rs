use super::{
    queue::MailQueue,
    sendmail::{MailError, MailJob, MailTemplate},
};

fn job(to: &str, subject: &str, template: MailTemplate, placeholders: &[(&str, &str)]) -> MailJob {
    MailJob {
        to: to.to_string(),
        subject: subject.to_string(),
        template,
        placeholders: placeholders
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        attempts: 0,
    }
}

pub fn create_verification_link(app_url: &str, token: &str) -> String {
    format!("{}/api/auth/verify-email?token={}", app_url.trim_end_matches('/'), token)
}

pub fn create_reset_link(app_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", app_url.trim_end_matches('/'), token)
}

pub async fn send_verification_email(
    queue: &MailQueue,
    app_url: &str,
    to_email: &str,
    name: &str,
    token: &str,
) {
    let link = create_verification_link(app_url, token);
    queue
        .enqueue(job(
            to_email,
            "Verify your Haulway email",
            MailTemplate::Verification,
            &[("name", name), ("verification_link", &link)],
        ))
        .await;
}

pub async fn send_welcome_email(queue: &MailQueue, to_email: &str, name: &str) {
    queue
        .enqueue(job(
            to_email,
            "Welcome to Haulway",
            MailTemplate::Welcome,
            &[("name", name)],
        ))
        .await;
}

pub async fn send_forgot_password_email(
    queue: &MailQueue,
    app_url: &str,
    to_email: &str,
    name: &str,
    token: &str,
) {
    let link = create_reset_link(app_url, token);
    queue
        .enqueue(job(
            to_email,
            "Reset your Haulway password",
            MailTemplate::ResetPassword,
            &[("name", name), ("reset_link", &link)],
        ))
        .await;
}

pub async fn send_delete_account_email(
    queue: &MailQueue,
    to_email: &str,
    name: &str,
    token: &str,
) -> Result<(), MailError> {
    queue
        .deliver(job(
            to_email,
            "Confirm your Haulway account deletion",
            MailTemplate::DeleteAccount,
            &[("name", name), ("token", token)],
        ))
        .await
}

pub async fn send_shipment_update_email(
    queue: &MailQueue,
    app_url: &str,
    to_email: &str,
    name: &str,
    shipment_id: i64,
    title: &str,
    body: &str,
) {
    let link = format!("{}/shipments/{}", app_url.trim_end_matches('/'), shipment_id);
    queue
        .enqueue(job(
            to_email,
            title,
            MailTemplate::ShipmentUpdate,
            &[("name", name), ("title", title), ("body", body), ("shipment_link", &link)],
        ))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_point_at_the_app() {
        assert_eq!(
            create_verification_link("https://haulway.pk/", "abc"),
            "https://haulway.pk/api/auth/verify-email?token=abc"
        );
        assert_eq!(
            create_reset_link("https://haulway.pk", "xyz"),
            "https://haulway.pk/reset-password?token=xyz"
        );
    }

    #[test]
    fn job_carries_placeholders() {
        let j = job("a@b.pk", "s", MailTemplate::Welcome, &[("name", "Ali")]);
        assert_eq!(j.placeholders, vec![("name".to_string(), "Ali".to_string())]);
        assert_eq!(j.attempts, 0);
    }
}
