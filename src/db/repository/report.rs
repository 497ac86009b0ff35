use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ToSql};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, Paged};
use crate::db::DatabaseError;
use crate::models::enums::{PaymentStatus, Priority, ReportStatus};
use crate::models::Report;

const COLUMNS: &str = "r.id, r.user_id, r.lab_test_id, r.report_number, r.status, \
     r.scheduled_at, r.collected_at, r.tested_at, r.reviewed_at, r.delivered_at, \
     r.sample_collected_by, r.collection_location, r.collection_notes, r.results, \
     r.observations, r.recommendations, r.file_path, r.file_original_name, r.file_size, \
     r.file_type, r.is_shared, r.shared_at, r.shared_with, r.is_verified, r.verified_by, \
     r.verified_at, r.amount_charged, r.payment_status, r.payment_reference, r.notes, \
     r.priority, r.created_at, r.updated_at";

fn report_from_row(row: &rusqlite::Row<'_>) -> Result<Report, rusqlite::Error> {
    Ok(Report {
        id: parse_uuid(0, row.get(0)?)?,
        user_id: parse_uuid(1, row.get(1)?)?,
        lab_test_id: parse_uuid(2, row.get(2)?)?,
        report_number: row.get(3)?,
        status: parse_enum(4, row.get(4)?)?,
        scheduled_at: row.get(5)?,
        collected_at: row.get(6)?,
        tested_at: row.get(7)?,
        reviewed_at: row.get(8)?,
        delivered_at: row.get(9)?,
        sample_collected_by: row.get(10)?,
        collection_location: row.get(11)?,
        collection_notes: row.get(12)?,
        results: row.get(13)?,
        observations: row.get(14)?,
        recommendations: row.get(15)?,
        file_path: row.get(16)?,
        file_original_name: row.get(17)?,
        file_size: row.get(18)?,
        file_type: row.get(19)?,
        is_shared: row.get(20)?,
        shared_at: row.get(21)?,
        shared_with: row.get(22)?,
        is_verified: row.get(23)?,
        verified_by: row.get(24)?,
        verified_at: row.get(25)?,
        amount_charged: row.get(26)?,
        payment_status: parse_enum(27, row.get(27)?)?,
        payment_reference: row.get(28)?,
        notes: row.get(29)?,
        priority: parse_enum(30, row.get(30)?)?,
        created_at: row.get(31)?,
        updated_at: row.get(32)?,
    })
}

pub fn insert_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO reports (id, user_id, lab_test_id, report_number, status,
         scheduled_at, collected_at, tested_at, reviewed_at, delivered_at,
         sample_collected_by, collection_location, collection_notes, results,
         observations, recommendations, file_path, file_original_name, file_size,
         file_type, is_shared, shared_at, shared_with, is_verified, verified_by,
         verified_at, amount_charged, payment_status, payment_reference, notes,
         priority, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28,
                 ?29, ?30, ?31, ?32, ?33)",
        params![
            report.id.to_string(),
            report.user_id.to_string(),
            report.lab_test_id.to_string(),
            report.report_number,
            report.status.as_str(),
            report.scheduled_at,
            report.collected_at,
            report.tested_at,
            report.reviewed_at,
            report.delivered_at,
            report.sample_collected_by,
            report.collection_location,
            report.collection_notes,
            report.results,
            report.observations,
            report.recommendations,
            report.file_path,
            report.file_original_name,
            report.file_size,
            report.file_type,
            report.is_shared,
            report.shared_at,
            report.shared_with,
            report.is_verified,
            report.verified_by,
            report.verified_at,
            report.amount_charged,
            report.payment_status.as_str(),
            report.payment_reference,
            report.notes,
            report.priority.as_str(),
            report.created_at,
            report.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_report(
    conn: &Connection,
    id: &Uuid,
    owner: Option<&Uuid>,
) -> Result<Option<Report>, DatabaseError> {
    let result = match owner {
        Some(user_id) => conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM reports r WHERE r.id = ?1 AND r.user_id = ?2"
            ))?
            .query_row(params![id.to_string(), user_id.to_string()], report_from_row),
        None => conn
            .prepare(&format!("SELECT {COLUMNS} FROM reports r WHERE r.id = ?1"))?
            .query_row(params![id.to_string()], report_from_row),
    };
    match result {
        Ok(report) => Ok(Some(report)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default, Clone)]
pub struct ReportFilter {
    pub user_id: Option<Uuid>,
    pub lab_test_id: Option<Uuid>,
    pub status: Option<ReportStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub priority: Option<Priority>,
    pub is_verified: Option<bool>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

fn filter_sql(filter: &ReportFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(user_id) = &filter.user_id {
        values.push(Box::new(user_id.to_string()));
        clauses.push(format!("r.user_id = ?{}", values.len()));
    }
    if let Some(lab_test_id) = &filter.lab_test_id {
        values.push(Box::new(lab_test_id.to_string()));
        clauses.push(format!("r.lab_test_id = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("r.status = ?{}", values.len()));
    }
    if let Some(payment_status) = filter.payment_status {
        values.push(Box::new(payment_status.as_str()));
        clauses.push(format!("r.payment_status = ?{}", values.len()));
    }
    if let Some(priority) = filter.priority {
        values.push(Box::new(priority.as_str()));
        clauses.push(format!("r.priority = ?{}", values.len()));
    }
    if let Some(is_verified) = filter.is_verified {
        values.push(Box::new(is_verified));
        clauses.push(format!("r.is_verified = ?{}", values.len()));
    }
    if let Some(from) = filter.date_from {
        values.push(Box::new(from));
        clauses.push(format!("r.created_at >= ?{}", values.len()));
    }
    if let Some(to) = filter.date_to {
        values.push(Box::new(to));
        clauses.push(format!("r.created_at <= ?{}", values.len()));
    }
    if let Some(search) = &filter.search {
        values.push(Box::new(format!("%{search}%")));
        let n = values.len();
        clauses.push(format!(
            "(LOWER(r.report_number) LIKE LOWER(?{n}) OR LOWER(r.notes) LIKE LOWER(?{n}) \
             OR LOWER(t.name) LIKE LOWER(?{n}))"
        ));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (where_clause, values)
}

pub fn list_reports(
    conn: &Connection,
    filter: &ReportFilter,
    page: i64,
    per_page: i64,
) -> Result<Paged<Report>, DatabaseError> {
    let (where_clause, count_values) = filter_sql(filter);
    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM reports r \
             JOIN lab_tests t ON t.id = r.lab_test_id{where_clause}"
        ),
        params_from_iter(count_values),
        |row| row.get(0),
    )?;

    let (where_clause, mut values) = filter_sql(filter);
    values.push(Box::new(per_page));
    let limit_idx = values.len();
    values.push(Box::new((page - 1) * per_page));
    let offset_idx = values.len();

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM reports r \
         JOIN lab_tests t ON t.id = r.lab_test_id{where_clause} \
         ORDER BY r.created_at DESC LIMIT ?{limit_idx} OFFSET ?{offset_idx}"
    ))?;
    let items = stmt
        .query_map(params_from_iter(values), report_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paged { items, total })
}

pub fn update_report(conn: &Connection, report: &Report) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE reports SET status = ?2, scheduled_at = ?3, collected_at = ?4,
         tested_at = ?5, reviewed_at = ?6, delivered_at = ?7, sample_collected_by = ?8,
         collection_location = ?9, collection_notes = ?10, results = ?11,
         observations = ?12, recommendations = ?13, file_path = ?14,
         file_original_name = ?15, file_size = ?16, file_type = ?17, is_shared = ?18,
         shared_at = ?19, shared_with = ?20, is_verified = ?21, verified_by = ?22,
         verified_at = ?23, amount_charged = ?24, payment_status = ?25,
         payment_reference = ?26, notes = ?27, priority = ?28, updated_at = ?29
         WHERE id = ?1",
        params![
            report.id.to_string(),
            report.status.as_str(),
            report.scheduled_at,
            report.collected_at,
            report.tested_at,
            report.reviewed_at,
            report.delivered_at,
            report.sample_collected_by,
            report.collection_location,
            report.collection_notes,
            report.results,
            report.observations,
            report.recommendations,
            report.file_path,
            report.file_original_name,
            report.file_size,
            report.file_type,
            report.is_shared,
            report.shared_at,
            report.shared_with,
            report.is_verified,
            report.verified_by,
            report.verified_at,
            report.amount_charged,
            report.payment_status.as_str(),
            report.payment_reference,
            report.notes,
            report.priority.as_str(),
            report.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: report.id.to_string(),
        });
    }
    Ok(())
}

pub fn delete_report(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM reports WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Report".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, serde::Serialize)]
pub struct ReportStats {
    pub total_reports: i64,
    pub pending_reports: i64,
    pub completed_reports: i64,
    pub paid_reports: i64,
    pub unpaid_reports: i64,
    pub verified_reports: i64,
    pub average_turnaround_hours: f64,
    pub total_revenue: f64,
}

/// Aggregate counts, scoped to one user unless called for an admin.
pub fn report_stats(conn: &Connection, owner: Option<&Uuid>) -> Result<ReportStats, DatabaseError> {
    let (scope, scope_params): (&str, Vec<String>) = match owner {
        Some(user_id) => (" WHERE r.user_id = ?1", vec![user_id.to_string()]),
        None => ("", vec![]),
    };
    let and_scope = if owner.is_some() { " AND r.user_id = ?1" } else { "" };

    let count = |sql: &str| -> Result<i64, DatabaseError> {
        Ok(conn.query_row(sql, params_from_iter(scope_params.clone()), |row| row.get(0))?)
    };

    let total_reports = count(&format!("SELECT COUNT(*) FROM reports r{scope}"))?;
    let pending_reports = count(&format!(
        "SELECT COUNT(*) FROM reports r WHERE r.status = 'pending'{and_scope}"
    ))?;
    let completed_reports = count(&format!(
        "SELECT COUNT(*) FROM reports r \
         WHERE r.status IN ('completed', 'reviewed', 'delivered'){and_scope}"
    ))?;
    let paid_reports = count(&format!(
        "SELECT COUNT(*) FROM reports r WHERE r.payment_status = 'paid'{and_scope}"
    ))?;
    let unpaid_reports = count(&format!(
        "SELECT COUNT(*) FROM reports r WHERE r.payment_status = 'pending'{and_scope}"
    ))?;
    let verified_reports = count(&format!(
        "SELECT COUNT(*) FROM reports r WHERE r.is_verified = 1{and_scope}"
    ))?;

    let average_turnaround_hours: f64 = conn.query_row(
        &format!(
            "SELECT COALESCE(AVG((julianday(r.delivered_at) - julianday(r.collected_at)) * 24), 0) \
             FROM reports r \
             WHERE r.collected_at IS NOT NULL AND r.delivered_at IS NOT NULL{and_scope}"
        ),
        params_from_iter(scope_params.clone()),
        |row| row.get(0),
    )?;

    let revenue_minor: i64 = conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(r.amount_charged), 0) FROM reports r \
             WHERE r.payment_status = 'paid' AND r.amount_charged IS NOT NULL{and_scope}"
        ),
        params_from_iter(scope_params),
        |row| row.get(0),
    )?;

    Ok(ReportStats {
        total_reports,
        pending_reports,
        completed_reports,
        paid_reports,
        unpaid_reports,
        verified_reports,
        average_turnaround_hours,
        total_revenue: revenue_minor as f64 / 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::super::lab_test::tests::sample_test;
    use super::super::user::tests::sample_user;
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::{insert_lab_test, insert_user};
    use crate::models::enums::UserRole;

    fn seeded_conn() -> (Connection, Uuid, Uuid) {
        let conn = open_memory_database().unwrap();
        let user = sample_user("alice", "alice@x.com", UserRole::User);
        let test = sample_test("CBC", "Blood Test", 500.0);
        insert_user(&conn, &user).unwrap();
        insert_lab_test(&conn, &test).unwrap();
        (conn, user.id, test.id)
    }

    fn sample_report(user_id: Uuid, lab_test_id: Uuid) -> Report {
        let now = Utc::now();
        Report {
            id: Uuid::new_v4(),
            user_id,
            lab_test_id,
            report_number: Report::generate_report_number(now),
            status: ReportStatus::Pending,
            scheduled_at: None,
            collected_at: None,
            tested_at: None,
            reviewed_at: None,
            delivered_at: None,
            sample_collected_by: None,
            collection_location: None,
            collection_notes: None,
            results: None,
            observations: None,
            recommendations: None,
            file_path: None,
            file_original_name: None,
            file_size: None,
            file_type: None,
            is_shared: false,
            shared_at: None,
            shared_with: None,
            is_verified: false,
            verified_by: None,
            verified_at: None,
            amount_charged: Some(50_000),
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            notes: None,
            priority: Priority::Normal,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn insert_get_round_trip() {
        let (conn, user_id, test_id) = seeded_conn();
        let report = sample_report(user_id, test_id);
        insert_report(&conn, &report).unwrap();

        let loaded = get_report(&conn, &report.id, Some(&user_id)).unwrap().unwrap();
        assert_eq!(loaded.report_number, report.report_number);
        assert_eq!(loaded.status, ReportStatus::Pending);
        assert_eq!(loaded.amount_charged, Some(50_000));

        let other = Uuid::new_v4();
        assert!(get_report(&conn, &report.id, Some(&other)).unwrap().is_none());
    }

    #[test]
    fn list_filters_by_status_and_search() {
        let (conn, user_id, test_id) = seeded_conn();
        let pending = sample_report(user_id, test_id);
        insert_report(&conn, &pending).unwrap();
        let mut done = sample_report(user_id, test_id);
        done.status = ReportStatus::Completed;
        insert_report(&conn, &done).unwrap();

        let by_status = list_reports(
            &conn,
            &ReportFilter {
                status: Some(ReportStatus::Completed),
                ..Default::default()
            },
            1,
            20,
        )
        .unwrap();
        assert_eq!(by_status.total, 1);
        assert_eq!(by_status.items[0].id, done.id);

        // Search hits the joined lab test name.
        let by_search = list_reports(
            &conn,
            &ReportFilter {
                search: Some("Test CBC".into()),
                ..Default::default()
            },
            1,
            20,
        )
        .unwrap();
        assert_eq!(by_search.total, 2);
    }

    #[test]
    fn update_and_delete() {
        let (conn, user_id, test_id) = seeded_conn();
        let mut report = sample_report(user_id, test_id);
        insert_report(&conn, &report).unwrap();

        report.set_status(ReportStatus::Completed, Utc::now()).unwrap();
        update_report(&conn, &report).unwrap();
        let loaded = get_report(&conn, &report.id, None).unwrap().unwrap();
        assert_eq!(loaded.status, ReportStatus::Completed);
        assert!(loaded.tested_at.is_some());

        delete_report(&conn, &report.id).unwrap();
        assert!(get_report(&conn, &report.id, None).unwrap().is_none());
    }

    #[test]
    fn user_delete_cascades_to_reports() {
        let (conn, user_id, test_id) = seeded_conn();
        let report = sample_report(user_id, test_id);
        insert_report(&conn, &report).unwrap();

        conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![user_id.to_string()])
            .unwrap();
        assert!(get_report(&conn, &report.id, None).unwrap().is_none());
    }

    #[test]
    fn stats_scope_to_owner() {
        let (conn, user_id, test_id) = seeded_conn();
        let other = sample_user("bob", "bob@x.com", UserRole::User);
        insert_user(&conn, &other).unwrap();

        let mut mine = sample_report(user_id, test_id);
        mine.payment_status = PaymentStatus::Paid;
        insert_report(&conn, &mine).unwrap();
        insert_report(&conn, &sample_report(other.id, test_id)).unwrap();

        let global = report_stats(&conn, None).unwrap();
        assert_eq!(global.total_reports, 2);
        assert_eq!(global.paid_reports, 1);
        assert!((global.total_revenue - 500.0).abs() < f64::EPSILON);

        let scoped = report_stats(&conn, Some(&user_id)).unwrap();
        assert_eq!(scoped.total_reports, 1);
    }
}
