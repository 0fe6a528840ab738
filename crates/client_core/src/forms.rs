use chrono::NaiveDate;
use shared::domain::{ClientId, ClientRecord, PaymentStatus, ProjectStatus};
use shared::protocol::{ClientFields, ProjectFields};
use thiserror::Error;

use crate::collection::RecordKey;
use crate::phone::PhoneField;

pub const CURRENCY_OPTIONS: &[&str] = &["USD", "KES", "EUR", "GBP"];

/// Local validation failure. Raised before any remote call is issued; a form
/// that does not validate never reaches the controller or the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("phone number must be between 7 and 12 digits")]
    InvalidPhone,
    #[error("a client must be selected")]
    MissingClient,
}

/// Working state of the add/edit client form. Starting an edit captures the
/// record's current values; cancelling discards them without touching the
/// collection or the network.
#[derive(Debug, Clone, Default)]
pub struct ClientForm {
    pub name: String,
    pub email: String,
    pub phone: PhoneField,
    pub company: String,
    editing: Option<RecordKey>,
}

impl ClientForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_edit(&mut self, key: RecordKey, record: &ClientRecord) {
        self.editing = Some(key);
        self.name = record.name.clone();
        self.email = record.email.clone().unwrap_or_default();
        self.phone = PhoneField::from_canonical(&record.phone);
        self.company = record.company.clone();
    }

    pub fn editing(&self) -> Option<RecordKey> {
        self.editing
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn validate(&self) -> Result<ClientFields, FormError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(FormError::Required("name"));
        }
        let phone = self.phone.value();
        if !phone.valid {
            return Err(FormError::InvalidPhone);
        }
        let email = self.email.trim();
        Ok(ClientFields {
            name: name.to_string(),
            email: (!email.is_empty()).then(|| email.to_string()),
            phone: phone.canonical,
            company: self.company.trim().to_string(),
        })
    }
}

/// Working state of the add-project form. New projects start active; a
/// missing start date defaults to today at submission.
#[derive(Debug, Clone)]
pub struct ProjectForm {
    pub title: String,
    pub client: Option<ClientId>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
    pub payment_amount: f64,
    pub payment_currency: String,
}

impl Default for ProjectForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            client: None,
            start_date: None,
            due_date: None,
            payment_status: PaymentStatus::Unpaid,
            payment_amount: 0.0,
            payment_currency: "USD".to_string(),
        }
    }
}

impl ProjectForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self, today: NaiveDate) -> Result<ProjectFields, FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::Required("title"));
        }
        let client = self.client.ok_or(FormError::MissingClient)?;
        Ok(ProjectFields {
            title: title.to_string(),
            client,
            status: ProjectStatus::Active,
            start_date: Some(self.start_date.unwrap_or(today)),
            due_date: self.due_date,
            payment_status: self.payment_status,
            payment_amount: Some(self.payment_amount),
            payment_currency: Some(self.payment_currency.clone()),
        })
    }
}
