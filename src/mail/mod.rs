pub mod mails;
pub mod queue;
pub mod sendmail;
