use shared::domain::{ClientId, ClientRecord, ProjectId, ProjectRecord};
use shared::protocol::{ClientFields, ClientPatch, ProjectFields, ProjectPatch};

use crate::transport::RemoteRecord;

impl RemoteRecord for ClientRecord {
    type Fields = ClientFields;
    type Patch = ClientPatch;

    const COLLECTION: &'static str = "clients";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn provisional(fields: &ClientFields) -> Self {
        Self {
            id: ClientId(0),
            name: fields.name.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            company: fields.company.clone(),
        }
    }

    fn apply_fields(&mut self, fields: &ClientFields) {
        self.name = fields.name.clone();
        self.email = fields.email.clone();
        self.phone = fields.phone.clone();
        self.company = fields.company.clone();
    }

    fn apply_patch(&mut self, patch: &ClientPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = Some(email.clone());
        }
        if let Some(phone) = &patch.phone {
            self.phone = phone.clone();
        }
        if let Some(company) = &patch.company {
            self.company = company.clone();
        }
    }
}

impl RemoteRecord for ProjectRecord {
    type Fields = ProjectFields;
    type Patch = ProjectPatch;

    const COLLECTION: &'static str = "projects";

    fn id(&self) -> i64 {
        self.id.0
    }

    fn provisional(fields: &ProjectFields) -> Self {
        Self {
            id: ProjectId(0),
            title: fields.title.clone(),
            status: fields.status,
            start_date: fields.start_date,
            due_date: fields.due_date,
            client: fields.client,
            // Server-side enrichment; unknown until the canonical record arrives.
            client_name: None,
            payment_status: fields.payment_status,
            payment_amount: fields.payment_amount,
            payment_currency: fields.payment_currency.clone(),
        }
    }

    fn apply_fields(&mut self, fields: &ProjectFields) {
        self.title = fields.title.clone();
        self.status = fields.status;
        self.start_date = fields.start_date;
        self.due_date = fields.due_date;
        self.client = fields.client;
        self.payment_status = fields.payment_status;
        self.payment_amount = fields.payment_amount;
        self.payment_currency = fields.payment_currency.clone();
    }

    fn apply_patch(&mut self, patch: &ProjectPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(payment_status) = patch.payment_status {
            self.payment_status = payment_status;
        }
        if let Some(payment_amount) = patch.payment_amount {
            self.payment_amount = payment_amount;
        }
        if let Some(payment_currency) = &patch.payment_currency {
            self.payment_currency = Some(payment_currency.clone());
        }
    }
}
