use chrono::NaiveDate;
use shared::domain::{ClientId, ClientRecord, ProjectRecord, ProjectStatus};

/// Project list tabs. `Outstanding` selects projects whose payment is still
/// open (unpaid or partial).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectTab {
    #[default]
    All,
    Active,
    Completed,
    Outstanding,
}

pub fn client_name(clients: &[ClientRecord], id: ClientId) -> Option<&str> {
    clients
        .iter()
        .find(|client| client.id == id)
        .map(|client| client.name.as_str())
}

/// A project is overdue when its due date has passed and it is not completed.
pub fn is_overdue(project: &ProjectRecord, today: NaiveDate) -> bool {
    match project.due_date {
        Some(due) => project.status != ProjectStatus::Completed && due < today,
        None => false,
    }
}

pub fn format_money(amount: Option<f64>, currency: Option<&str>) -> String {
    match amount {
        Some(amount) => format!("{amount:.2} {}", currency.unwrap_or("USD")),
        None => "-".to_string(),
    }
}

/// Applies the tab filter and a case-insensitive title/client-name search.
pub fn filter_projects<'a>(
    projects: &'a [ProjectRecord],
    clients: &[ClientRecord],
    tab: ProjectTab,
    search: &str,
) -> Vec<&'a ProjectRecord> {
    let needle = search.trim().to_lowercase();
    projects
        .iter()
        .filter(|project| match tab {
            ProjectTab::All => true,
            ProjectTab::Active => project.status == ProjectStatus::Active,
            ProjectTab::Completed => project.status == ProjectStatus::Completed,
            ProjectTab::Outstanding => project.payment_status.is_outstanding(),
        })
        .filter(|project| {
            if needle.is_empty() {
                return true;
            }
            if project.title.to_lowercase().contains(&needle) {
                return true;
            }
            client_name(clients, project.client)
                .or(project.client_name.as_deref())
                .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use shared::domain::{PaymentStatus, ProjectId};

    use super::*;

    fn client(id: i64, name: &str) -> ClientRecord {
        ClientRecord {
            id: ClientId(id),
            name: name.to_string(),
            email: None,
            phone: "+254712345678".to_string(),
            company: String::new(),
        }
    }

    fn project(id: i64, title: &str, status: ProjectStatus, payment: PaymentStatus) -> ProjectRecord {
        ProjectRecord {
            id: ProjectId(id),
            title: title.to_string(),
            status,
            start_date: None,
            due_date: None,
            client: ClientId(1),
            client_name: None,
            payment_status: payment,
            payment_amount: None,
            payment_currency: None,
        }
    }

    #[test]
    fn tabs_partition_by_status_and_payment() {
        let projects = vec![
            project(1, "Site", ProjectStatus::Active, PaymentStatus::Unpaid),
            project(2, "Logo", ProjectStatus::Completed, PaymentStatus::Paid),
            project(3, "App", ProjectStatus::Completed, PaymentStatus::Partial),
        ];
        let clients = vec![client(1, "Jane")];

        let active = filter_projects(&projects, &clients, ProjectTab::Active, "");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, ProjectId(1));

        let outstanding = filter_projects(&projects, &clients, ProjectTab::Outstanding, "");
        let ids: Vec<i64> = outstanding.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn search_matches_title_or_client_name_case_insensitively() {
        let projects = vec![
            project(1, "Website redesign", ProjectStatus::Active, PaymentStatus::Unpaid),
            project(2, "Logo", ProjectStatus::Active, PaymentStatus::Unpaid),
        ];
        let clients = vec![client(1, "Jane Doe")];

        let by_title = filter_projects(&projects, &clients, ProjectTab::All, "WEBSITE");
        assert_eq!(by_title.len(), 1);

        let by_client = filter_projects(&projects, &clients, ProjectTab::All, "jane");
        assert_eq!(by_client.len(), 2);
    }

    #[test]
    fn overdue_requires_a_past_due_date_and_open_status() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 15).expect("date");
        let mut p = project(1, "Site", ProjectStatus::Active, PaymentStatus::Unpaid);
        assert!(!is_overdue(&p, today));

        p.due_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        assert!(is_overdue(&p, today));

        p.status = ProjectStatus::Completed;
        assert!(!is_overdue(&p, today));
    }

    #[test]
    fn money_formatting_handles_missing_amounts() {
        assert_eq!(format_money(Some(1500.5), Some("KES")), "1500.50 KES");
        assert_eq!(format_money(Some(20.0), None), "20.00 USD");
        assert_eq!(format_money(None, Some("EUR")), "-");
    }
}
