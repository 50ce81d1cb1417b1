pub mod dispatcher;
pub mod mailer;
pub mod templates;

pub use dispatcher::Notifier;
pub use mailer::{LogMailer, MailTransport, RelayMailer};
pub use templates::Notice;
