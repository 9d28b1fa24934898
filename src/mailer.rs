use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::MailSettings;
use crate::models::{Language, Participant};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("no mail relay configured")]
    NotConfigured,
}

/// Sends the signup confirmation.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, participant: &Participant, language: Language) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    event_name: String,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let tls = TlsParameters::new(settings.host.clone())?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(Tls::Opportunistic(tls));
        if let Some((user, password)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from: settings.from.parse()?,
            event_name: settings.event_name.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_confirmation(&self, participant: &Participant, language: Language) -> Result<(), MailError> {
        let (subject, body) = confirmation(&self.event_name, participant, language);
        let to = Mailbox::new(
            Some(format!("{} {}", participant.firstname, participant.lastname)),
            participant.email.parse::<Address>()?,
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Used when no relay is configured; every send fails and gets logged.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send_confirmation(&self, _participant: &Participant, _language: Language) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

fn yes_no(value: bool, language: Language) -> &'static str {
    match (language, value) {
        (Language::Fi, true) => "Kyllä",
        (Language::Fi, false) => "Ei",
        (Language::En, true) => "Yes",
        (Language::En, false) => "No",
    }
}

/// Subject and plain-text body of the confirmation mail.
pub fn confirmation(event_name: &str, p: &Participant, language: Language) -> (String, String) {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();
    let yn = |v: bool| yes_no(v, language);
    match language {
        Language::Fi => (
            format!("{} Ilmoittautuminen", event_name),
            format!(
                "Kiitos ilmoittautumisesta\n\n\
                 Ilmoittauduit seuraavin tiedoin:\n\n\
                 Nimi: {} {}\n\
                 Sähköposti: {}\n\
                 Erityisruokavaliot: {}\n\
                 Alkoholia: {}\n\
                 Pöytäryhmä: {}\n\
                 Avec: {}\n\
                 Edustamani taho: {}\n\
                 Jätän tervehdyksen: {}\n\
                 Alumni: {}\n\
                 Sillis: {}\n",
                p.firstname,
                p.lastname,
                p.email,
                opt(&p.diet),
                yn(p.alcohol),
                opt(&p.table_group),
                opt(&p.avec),
                opt(&p.organisation),
                yn(p.gift),
                yn(p.alumni),
                yn(p.sillis),
            ),
        ),
        Language::En => (
            format!("{} Sign Up", event_name),
            format!(
                "Thank you for signing up\n\n\
                 You have registered with the following information:\n\n\
                 Name: {} {}\n\
                 Email: {}\n\
                 Dietary restrictions: {}\n\
                 Alcohol: {}\n\
                 Table group: {}\n\
                 Avec: {}\n\
                 Represented organisation: {}\n\
                 I shall leave a salute: {}\n\
                 Alumni: {}\n\
                 Sillis: {}\n",
                p.firstname,
                p.lastname,
                p.email,
                opt(&p.diet),
                yn(p.alcohol),
                opt(&p.table_group),
                opt(&p.avec),
                opt(&p.organisation),
                yn(p.gift),
                yn(p.alumni),
                yn(p.sillis),
            ),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn participant() -> Participant {
        Participant {
            id: 7,
            firstname: "Aino".to_string(),
            lastname: "Virtanen".to_string(),
            email: "aino@example.com".to_string(),
            diet: Some("vegan".to_string()),
            alcohol: true,
            table_group: None,
            avec: None,
            organisation: Some("Guild".to_string()),
            gift: false,
            invited: false,
            alumni: true,
            sillis: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_confirmation_follows_language() {
        let (subject, body) = confirmation("Gala", &participant(), Language::Fi);
        assert_eq!(subject, "Gala Ilmoittautuminen");
        assert!(body.contains("Nimi: Aino Virtanen"));
        assert!(body.contains("Alkoholia: Kyllä"));

        let (subject, body) = confirmation("Gala", &participant(), Language::En);
        assert_eq!(subject, "Gala Sign Up");
        assert!(body.contains("Dietary restrictions: vegan"));
        assert!(body.contains("Table group: \n"));
        assert!(body.contains("I shall leave a salute: No"));
    }
}
