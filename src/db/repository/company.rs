use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::Company;

const COLUMNS: &str = "name, legal_name, description, email, phone_primary, phone_secondary, \
     website, address_line1, address_line2, city, state, postal_code, country, \
     established_year, license_number, accreditation, services, specializations, \
     certifications, operating_hours, emergency_contact, is_24x7, accepts_home_collection, \
     home_collection_radius_km, minimum_order_amount, logo_url, tagline, is_active, \
     created_at, updated_at";

fn json_list(idx: usize, value: Option<String>) -> Result<Vec<String>, rusqlite::Error> {
    match value {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

fn company_from_row(row: &rusqlite::Row<'_>) -> Result<Company, rusqlite::Error> {
    let operating_hours: Option<String> = row.get(19)?;
    let operating_hours = match operating_hours {
        None => None,
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(19, rusqlite::types::Type::Text, Box::new(e))
        })?),
    };

    Ok(Company {
        name: row.get(0)?,
        legal_name: row.get(1)?,
        description: row.get(2)?,
        email: row.get(3)?,
        phone_primary: row.get(4)?,
        phone_secondary: row.get(5)?,
        website: row.get(6)?,
        address_line1: row.get(7)?,
        address_line2: row.get(8)?,
        city: row.get(9)?,
        state: row.get(10)?,
        postal_code: row.get(11)?,
        country: row.get(12)?,
        established_year: row.get(13)?,
        license_number: row.get(14)?,
        accreditation: row.get(15)?,
        services: json_list(16, row.get(16)?)?,
        specializations: json_list(17, row.get(17)?)?,
        certifications: json_list(18, row.get(18)?)?,
        operating_hours,
        emergency_contact: row.get(20)?,
        is_24x7: row.get(21)?,
        accepts_home_collection: row.get(22)?,
        home_collection_radius_km: row.get(23)?,
        minimum_order_amount: row.get(24)?,
        logo_url: row.get(25)?,
        tagline: row.get(26)?,
        is_active: row.get(27)?,
        created_at: row.get(28)?,
        updated_at: row.get(29)?,
    })
}

/// The active company profile, if the deployment has one.
pub fn get_company(conn: &Connection) -> Result<Option<Company>, DatabaseError> {
    let result = conn
        .prepare(&format!(
            "SELECT {COLUMNS} FROM company WHERE id = 1 AND is_active = 1"
        ))?
        .query_row([], company_from_row);
    match result {
        Ok(company) => Ok(Some(company)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn update_company(conn: &Connection, company: &Company) -> Result<(), DatabaseError> {
    let services = serde_json::to_string(&company.services).unwrap_or_else(|_| "[]".into());
    let specializations =
        serde_json::to_string(&company.specializations).unwrap_or_else(|_| "[]".into());
    let certifications =
        serde_json::to_string(&company.certifications).unwrap_or_else(|_| "[]".into());
    let operating_hours = company
        .operating_hours
        .as_ref()
        .map(|hours| hours.to_string());

    let changed = conn.execute(
        "UPDATE company SET name = ?1, legal_name = ?2, description = ?3, email = ?4,
         phone_primary = ?5, phone_secondary = ?6, website = ?7, address_line1 = ?8,
         address_line2 = ?9, city = ?10, state = ?11, postal_code = ?12, country = ?13,
         established_year = ?14, license_number = ?15, accreditation = ?16, services = ?17,
         specializations = ?18, certifications = ?19, operating_hours = ?20,
         emergency_contact = ?21, is_24x7 = ?22, accepts_home_collection = ?23,
         home_collection_radius_km = ?24, minimum_order_amount = ?25, logo_url = ?26,
         tagline = ?27, is_active = ?28, updated_at = ?29
         WHERE id = 1",
        params![
            company.name,
            company.legal_name,
            company.description,
            company.email,
            company.phone_primary,
            company.phone_secondary,
            company.website,
            company.address_line1,
            company.address_line2,
            company.city,
            company.state,
            company.postal_code,
            company.country,
            company.established_year,
            company.license_number,
            company.accreditation,
            services,
            specializations,
            certifications,
            operating_hours,
            company.emergency_contact,
            company.is_24x7,
            company.accepts_home_collection,
            company.home_collection_radius_km,
            company.minimum_order_amount,
            company.logo_url,
            company.tagline,
            company.is_active,
            company.updated_at,
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Company".into(),
            id: "1".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use chrono::Utc;

    #[test]
    fn seeded_company_loads() {
        let conn = open_memory_database().unwrap();
        let company = get_company(&conn).unwrap().unwrap();
        assert_eq!(company.name, "VitaLab");
        assert!(company.services.is_empty());
        assert_eq!(company.country, "India");
    }

    #[test]
    fn update_round_trips_json_lists() {
        let conn = open_memory_database().unwrap();
        let mut company = get_company(&conn).unwrap().unwrap();
        company.name = "VitaCheck Labs".into();
        company.services = vec!["Blood Tests".into(), "Home Collection".into()];
        company.operating_hours = Some(serde_json::json!({"monday": "08:00-20:00"}));
        company.updated_at = Utc::now();
        update_company(&conn, &company).unwrap();

        let loaded = get_company(&conn).unwrap().unwrap();
        assert_eq!(loaded.name, "VitaCheck Labs");
        assert_eq!(loaded.services.len(), 2);
        assert_eq!(loaded.operating_hours.unwrap()["monday"], "08:00-20:00");
    }

    #[test]
    fn deactivated_company_is_hidden() {
        let conn = open_memory_database().unwrap();
        let mut company = get_company(&conn).unwrap().unwrap();
        company.is_active = false;
        company.updated_at = Utc::now();
        update_company(&conn, &company).unwrap();
        assert!(get_company(&conn).unwrap().is_none());
    }
}
